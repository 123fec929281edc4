//! Serve several concurrent "sessions", each with its own scoped provider
//! instances, sharing one singleton underneath.
//!
//! Run with `cargo run --example scoped_sessions`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use provident::{Provider, RegistryBuilder};

static OPENED: AtomicU32 = AtomicU32::new(0);

struct Store;

struct Session {
    id: String,
    _store: Arc<Store>,
}

fn store() -> Provider<Store> {
    Provider::builder("store")
        .singleton()
        .build(|_scope, _deps| async {
            OPENED.fetch_add(1, Ordering::SeqCst);
            Ok(Store)
        })
}

fn session() -> Provider<Session> {
    Provider::builder("session")
        .dependency("store", "store")
        .on_destroy(|_scope, session: Arc<Session>| async move {
            println!("session {} closed", session.id);
            Ok(())
        })
        .build(|scope, deps| async move {
            Ok(Session {
                id: scope.to_string(),
                _store: deps.get::<Store>("store")?,
            })
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let session = session();
    let _registry = RegistryBuilder::new()
        .register(store())
        .register(session.clone())
        .build();

    let mut workers = Vec::new();
    for n in 0..4 {
        let session = session.clone();
        workers.push(tokio::spawn(async move {
            let scope = format!("user-{n}");
            session
                .use_with(scope.as_str(), |s| async move {
                    println!("serving {}", s.id);
                    Ok::<_, provident::Error>(())
                })
                .await
        }));
    }
    for worker in workers {
        worker.await??;
    }

    // Every session shared the one store.
    assert_eq!(OPENED.load(Ordering::SeqCst), 1);
    println!("all sessions served over one store");
    Ok(())
}
