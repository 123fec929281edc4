use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use provident::{Error, Provider};
use tokio::time::sleep;

#[tokio::test]
async fn concurrent_gets_share_one_factory_invocation() {
    let builds = Arc::new(AtomicU32::new(0));
    let provider = Provider::builder("slow").build({
        let builds = Arc::clone(&builds);
        move |_scope, _deps| {
            let builds = Arc::clone(&builds);
            async move {
                sleep(Duration::from_millis(20)).await;
                builds.fetch_add(1, Ordering::SeqCst);
                Ok("instance")
            }
        }
    });

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move { provider.get("s").await })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await.unwrap().unwrap());
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
    assert_eq!(provider.ref_count("s"), 16);
}

#[tokio::test]
async fn concurrent_destroys_collapse_to_one_teardown() {
    let destroys = Arc::new(AtomicU32::new(0));
    let provider = Provider::builder("victim")
        .on_destroy({
            let destroys = Arc::clone(&destroys);
            move |_scope, _instance| {
                let destroys = Arc::clone(&destroys);
                async move {
                    sleep(Duration::from_millis(10)).await;
                    destroys.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        })
        .build(|_scope, _deps| async { Ok(0u8) });

    provider.get("s").await.unwrap();

    let (a, b, c) = tokio::join!(
        provider.destroy("s"),
        provider.destroy("s"),
        provider.destroy("s"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(destroys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_during_destroy_waits_then_rebuilds() {
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let ids = Arc::new(AtomicU32::new(0));

    let provider = Provider::builder("reborn")
        .on_destroy({
            let events = Arc::clone(&events);
            move |_scope, _instance| {
                let events = Arc::clone(&events);
                async move {
                    sleep(Duration::from_millis(30)).await;
                    events.lock().unwrap().push("destroyed");
                    Ok(())
                }
            }
        })
        .build({
            let events = Arc::clone(&events);
            let ids = Arc::clone(&ids);
            move |_scope, _deps| {
                let events = Arc::clone(&events);
                let ids = Arc::clone(&ids);
                async move {
                    events.lock().unwrap().push("built");
                    Ok(ids.fetch_add(1, Ordering::SeqCst) + 1)
                }
            }
        });

    let first = provider.get("s").await.unwrap();
    assert_eq!(*first, 1);

    let destroyer = {
        let provider = provider.clone();
        tokio::spawn(async move { provider.destroy("s").await })
    };
    // Let the destroy start before racing it with a get.
    tokio::task::yield_now().await;

    let second = provider.get("s").await.unwrap();
    destroyer.await.unwrap().unwrap();

    assert_eq!(*second, 2);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["built", "destroyed", "built"],
        "the racing get must wait for the teardown before rebuilding"
    );
}

#[tokio::test]
async fn build_failure_reaches_every_concurrent_waiter_then_retries() {
    let attempts = Arc::new(AtomicU32::new(0));
    let provider = Provider::builder("flaky").build({
        let attempts = Arc::clone(&attempts);
        move |_scope, _deps| {
            let attempts = Arc::clone(&attempts);
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                if attempt == 0 {
                    anyhow::bail!("cold start");
                }
                Ok(attempt)
            }
        }
    });

    let (a, b, c) = tokio::join!(provider.get("s"), provider.get("s"), provider.get("s"));
    for outcome in [a, b, c] {
        assert!(matches!(outcome, Err(Error::Build { .. })));
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "one shared attempt");
    assert!(!provider.is_cached("s"));

    assert_eq!(*provider.get("s").await.unwrap(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
