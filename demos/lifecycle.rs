//! Walk through the provider lifecycle: scoped builds, shared dependencies,
//! reference-counted disposal, and registry startup/shutdown.
//!
//! Run with `cargo run --example lifecycle`.

use std::sync::Arc;

use provident::{Provider, RegistryBuilder};

struct Config {
    url: String,
}

struct Pool {
    cfg: Arc<Config>,
    name: String,
}

fn config() -> Provider<Config> {
    Provider::builder("config")
        .singleton()
        .eager()
        .build(|_scope, _deps| async {
            println!("building config");
            Ok(Config {
                url: "postgres://localhost".into(),
            })
        })
}

fn pool() -> Provider<Pool> {
    Provider::builder("pool")
        .dependency("cfg", "config")
        .on_destroy(|scope, pool: Arc<Pool>| async move {
            println!("closing pool '{}' for scope {scope}", pool.name);
            Ok(())
        })
        .build(|scope, deps| async move {
            println!("opening pool for scope {scope}");
            Ok(Pool {
                cfg: deps.get::<Config>("cfg")?,
                name: format!("pool-{scope}"),
            })
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let pool = pool();
    let registry = RegistryBuilder::new()
        .register(config())
        .register(pool.clone())
        .build();

    // Eager providers come up front.
    let warm = registry.startup("main").await?;
    println!("startup built {} provider(s)", warm.len());

    // Two holders of the same scoped instance.
    let a = pool.get("request-1").await?;
    let b = pool.get("request-1").await?;
    assert!(Arc::ptr_eq(&a, &b));
    println!("pool '{}' connects to {}", a.name, a.cfg.url);

    // First dispose only decrements; the second tears down.
    pool.dispose("request-1").await?;
    pool.dispose("request-1").await?;

    // Scoped use with guaranteed cleanup.
    pool.use_with("request-2", |pool| async move {
        println!("borrowed '{}'", pool.name);
        Ok::<_, provident::Error>(())
    })
    .await?;

    registry.shutdown("main").await?;
    Ok(())
}
