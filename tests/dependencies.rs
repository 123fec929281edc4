use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use provident::{Error, Provider, RegistryBuilder};

struct Database {
    id: u32,
}

struct Repo {
    db: Arc<Database>,
}

fn database(ids: Arc<AtomicU32>, destroys: Arc<AtomicU32>) -> Provider<Database> {
    Provider::builder("database")
        .on_destroy(move |_scope, _instance| {
            let destroys = Arc::clone(&destroys);
            async move {
                destroys.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build(move |_scope, _deps| {
            let ids = Arc::clone(&ids);
            async move {
                Ok(Database {
                    id: ids.fetch_add(1, Ordering::SeqCst) + 1,
                })
            }
        })
}

fn repo(key: &str) -> Provider<Repo> {
    Provider::builder(key)
        .dependency("db", "database")
        .build(|_scope, deps| async move {
            Ok(Repo {
                db: deps.get::<Database>("db")?,
            })
        })
}

#[tokio::test]
async fn the_factory_receives_the_scoped_dependency_instance() {
    let db = database(Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));
    let repo = repo("repo");
    let _registry = RegistryBuilder::new()
        .register(db.clone())
        .register(repo.clone())
        .build();

    let built = repo.get("s").await.unwrap();
    let direct = db.get("s").await.unwrap();

    assert!(Arc::ptr_eq(&built.db, &direct));

    let other_scope = db.get("t").await.unwrap();
    assert!(!Arc::ptr_eq(&built.db, &other_scope));
}

#[tokio::test]
async fn destroying_the_parent_releases_the_dependency() {
    let destroys = Arc::new(AtomicU32::new(0));
    let db = database(Arc::new(AtomicU32::new(0)), Arc::clone(&destroys));
    let repo = repo("repo");
    let _registry = RegistryBuilder::new()
        .register(db.clone())
        .register(repo.clone())
        .build();

    repo.get("s").await.unwrap();
    assert_eq!(db.ref_count("s"), 1, "held by the repo build");

    repo.destroy("s").await.unwrap();

    assert_eq!(destroys.load(Ordering::SeqCst), 1);
    assert!(!db.is_cached("s"));
}

#[tokio::test]
async fn a_shared_dependency_outlives_all_but_the_last_parent() {
    let destroys = Arc::new(AtomicU32::new(0));
    let db = database(Arc::new(AtomicU32::new(0)), Arc::clone(&destroys));
    let first = repo("first");
    let second = repo("second");
    let _registry = RegistryBuilder::new()
        .register(db.clone())
        .register(first.clone())
        .register(second.clone())
        .build();

    let a = first.get("s").await.unwrap();
    let b = second.get("s").await.unwrap();
    assert!(Arc::ptr_eq(&a.db, &b.db));
    assert_eq!(db.ref_count("s"), 2);

    first.destroy("s").await.unwrap();
    assert_eq!(destroys.load(Ordering::SeqCst), 0, "second still holds it");
    assert!(db.is_cached("s"));

    second.destroy("s").await.unwrap();
    assert_eq!(destroys.load(Ordering::SeqCst), 1);
    assert!(!db.is_cached("s"));
}

#[tokio::test]
async fn teardown_cascades_through_a_chain() {
    let order: Arc<std::sync::Mutex<Vec<&'static str>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));

    fn link(
        key: &str,
        dep: Option<&str>,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> Provider<u8> {
        let mut builder = Provider::builder(key).on_destroy(move |_scope, _instance| {
            let order = Arc::clone(&order);
            async move {
                order.lock().unwrap().push(label);
                Ok(())
            }
        });
        if let Some(dep_key) = dep {
            builder = builder.dependency("next", dep_key);
        }
        builder.build(|_scope, deps| async move {
            if !deps.is_empty() {
                deps.get::<u8>("next")?;
            }
            Ok(0)
        })
    }

    let a = link("a", Some("b"), Arc::clone(&order), "a");
    let b = link("b", Some("c"), Arc::clone(&order), "b");
    let c = link("c", None, Arc::clone(&order), "c");
    let _registry = RegistryBuilder::new()
        .register(a.clone())
        .register(b.clone())
        .register(c.clone())
        .build();

    a.get("s").await.unwrap();
    a.destroy("s").await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    assert!(!b.is_cached("s"));
    assert!(!c.is_cached("s"));
}

#[tokio::test]
async fn a_singleton_dependency_is_shared_across_parent_scopes() {
    let ids = Arc::new(AtomicU32::new(0));
    let settings = Provider::builder("settings").singleton().build({
        let ids = Arc::clone(&ids);
        move |_scope, _deps| {
            let ids = Arc::clone(&ids);
            async move { Ok(ids.fetch_add(1, Ordering::SeqCst) + 1) }
        }
    });
    let consumer = Provider::builder("consumer")
        .dependency("cfg", "settings")
        .build(|_scope, deps| async move { Ok(*deps.get::<u32>("cfg")?) });

    let _registry = RegistryBuilder::new()
        .register(settings.clone())
        .register(consumer.clone())
        .build();

    let in_s = consumer.get("s").await.unwrap();
    let in_t = consumer.get("t").await.unwrap();

    assert_eq!(*in_s, 1);
    assert_eq!(*in_t, 1);
    assert_eq!(ids.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_missing_dependency_key_fails_the_build() {
    let lonely = Provider::builder("lonely")
        .dependency("gone", "missing")
        .build(|_scope, deps| async move { Ok(*deps.get::<u8>("gone")?) });
    let _registry = RegistryBuilder::new().register(lonely.clone()).build();

    match lonely.get("s").await {
        Err(Error::KeyNotFound { key }) => assert_eq!(key.as_str(), "missing"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    assert!(!lonely.is_cached("s"), "failed builds are never cached");
}

#[tokio::test]
async fn requesting_a_dependency_under_the_wrong_type_fails_the_build() {
    let number = Provider::builder("number").build(|_s, _d| async { Ok(3u32) });
    let wrong = Provider::builder("wrong")
        .dependency("n", "number")
        .build(|_scope, deps| async move {
            let text = deps.get::<String>("n")?;
            Ok(text.len())
        });
    let _registry = RegistryBuilder::new()
        .register(number)
        .register(wrong.clone())
        .build();

    match wrong.get("s").await {
        Err(Error::Build { source, .. }) => {
            assert!(source.to_string().contains("no resolved dependency"));
        }
        other => panic!("expected Build error, got {other:?}"),
    }
}
