use std::path::{Path, PathBuf};
use std::sync::Arc;

use pyrunner::cache::PackageCache;
use pyrunner::config::Settings;
use pyrunner::delivery::{DeliveryConfig, Dispatcher, OUTPUT_PREFIX};
use pyrunner::events::{Event, EventBus};
use pyrunner::installer::mock::MockPackageManager;

fn dispatcher(scratch: &Path, python: &str, chunk_limit: usize) -> Dispatcher {
    let settings = Settings {
        python: PathBuf::from(python),
        ..Settings::default()
    };
    let engine = settings.build_engine(
        Arc::new(MockPackageManager::new()),
        Arc::new(PackageCache::new()),
    );
    Dispatcher::new(
        Arc::new(engine),
        DeliveryConfig {
            scratch_dir: scratch.to_path_buf(),
            chunk_limit,
        },
    )
}

fn leftovers(scratch: &Path) -> usize {
    std::fs::read_dir(scratch).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn successful_run_is_prefixed_and_cleaned_up() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "sh", 4096);

    let reply = dispatcher.submit("hello.py", b"echo hello\n").await.unwrap();

    assert!(reply.ok);
    assert_eq!(reply.chunks, vec![format!("{OUTPUT_PREFIX}hello\n")]);
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn failing_program_is_cleaned_up() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "sh", 4096);

    let reply = dispatcher
        .submit("fail.py", b"echo 'RuntimeError: nope' >&2\nexit 1\n")
        .await
        .unwrap();

    assert!(reply.ok);
    assert!(reply.chunks[0].contains("RuntimeError"));
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn engine_failure_is_cleaned_up() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "/nonexistent/python-for-tests", 4096);

    let reply = dispatcher.submit("x.py", b"print('hi')\n").await.unwrap();

    assert!(!reply.ok);
    assert!(reply.chunks[0].starts_with("Error:"));
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn non_python_files_are_rejected_before_writing() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "sh", 4096);

    let err = dispatcher.submit("notes.txt", b"hello").await.unwrap_err();

    assert!(err.to_string().contains(".py"));
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn directory_components_are_stripped() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "sh", 4096);

    let reply = dispatcher
        .submit("../../etc/sneaky.py", b"basename \"$0\"\n")
        .await
        .unwrap();

    assert_eq!(reply.chunks, vec![format!("{OUTPUT_PREFIX}sneaky.py\n")]);
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn same_name_concurrent_submissions_do_not_collide() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(dispatcher(scratch.path(), "sh", 4096));

    let handles: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|word| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let body = format!("sleep 0.2\necho {word}\n");
                let reply = dispatcher.submit("main.py", body.as_bytes()).await.unwrap();
                (word, reply)
            })
        })
        .collect();

    for handle in handles {
        let (word, reply) = handle.await.unwrap();
        assert_eq!(reply.chunks, vec![format!("{OUTPUT_PREFIX}{word}\n")]);
    }
    assert_eq!(leftovers(scratch.path()), 0);
}

#[tokio::test]
async fn long_replies_are_split_for_the_transport() {
    let scratch = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher(scratch.path(), "sh", 100);

    let reply = dispatcher
        .submit(
            "long.py",
            b"i=0\nwhile [ $i -lt 100 ]; do echo line$i; i=$((i+1)); done\n",
        )
        .await
        .unwrap();

    assert!(reply.chunks.len() > 1);
    assert!(reply.chunks.iter().all(|c| c.len() <= 100));
    assert!(reply.chunks.concat().starts_with(OUTPUT_PREFIX));
    assert!(reply.chunks.concat().ends_with("line99\n"));
}

#[tokio::test]
async fn received_event_is_emitted() {
    let scratch = tempfile::tempdir().unwrap();
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let dispatcher = dispatcher(scratch.path(), "sh", 4096).with_events(Arc::clone(&bus));

    dispatcher.submit("ping.py", b"echo pong\n").await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        Event::Received {
            request: "ping.py".to_string()
        }
    );
}
