use crate::silent_logs;
use sluice::{
    Connection, Database, Tx, Value, query_error,
    stream::{StreamExt, TryStreamExt},
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn transacted<C: Connection>(db: &Database<C>) {
    let _lock = MUTEX.lock().await;
    let items: Vec<Tx<C, i64>> = db
        .select("SELECT score FROM person WHERE name = ?")
        .expect("Could not parse the query")
        .parameters(["FRED", "JOSEPH"])
        .expect("Could not bind the parameters")
        .transacted()
        .get_as()
        .expect("Could not build the query")
        .try_collect()
        .await
        .expect("Could not run the transacted query");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].value(), Some(&21));
    assert_eq!(items[1].value(), Some(&34));
    assert!(items[2].is_complete());
    assert!(items[2].connection().is_closed());
    assert!(items[0].connection().same_as(items[2].connection()));

    let values: Vec<i64> = db
        .select("SELECT score FROM person WHERE name = :name")
        .unwrap()
        .parameter("name", "JOSEPH")
        .unwrap()
        .transacted()
        .values_only()
        .get_as()
        .unwrap()
        .map_ok(|tx: Tx<C, i64>| tx.into_value().unwrap_or_default())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(values, [34]);
}

pub async fn chained<C: Connection>(db: &Database<C>) {
    let _lock = MUTEX.lock().await;
    let scores = db
        .select("SELECT score FROM person WHERE name = ?")
        .unwrap()
        .parameters(["FRED", "JOSEPH"])
        .unwrap()
        .transacted()
        .values_only()
        .get_as::<i64>()
        .unwrap();
    let chained = db.clone();
    let names: Vec<(String, usize)> = scores
        .map(move |tx| {
            let tx = tx?;
            let score = tx.value().copied().unwrap_or_default();
            chained
                .tx(&tx)
                .select("SELECT name FROM person WHERE score = ?")?
                .parameters([score])?
                .values_only()
                .get_as::<String>()
        })
        .try_flatten()
        .map_ok(|tx| {
            let holders = tx.connection().counter();
            (tx.into_value().unwrap_or_default(), holders)
        })
        .try_collect()
        .await
        .expect("Could not run the chained queries");
    assert_eq!(
        names,
        [("FRED".to_string(), 2), ("JOSEPH".to_string(), 2)],
        "Both the outer and the inner query hold the connection"
    );
}

pub async fn transaction_rollback<C: Connection>(db: &Database<C>) {
    let _lock = MUTEX.lock().await;
    silent_logs! {
        let error = db
            .select("INSERT INTO person (name, score) VALUES (?, ?)")
            .unwrap()
            .parameters([
                Value::from("ZED"),
                Value::from(1),
                Value::from("FRED"),
                Value::from(2),
            ])
            .unwrap()
            .transacted()
            .get(|_| Ok(()))
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .expect_err("FRED is already present");
        assert!(query_error(&error).is_some_and(|e| e.is_execution()));
    }
    let zed: Vec<i64> = db
        .select("SELECT score FROM person WHERE name = ?")
        .unwrap()
        .parameters(["ZED"])
        .unwrap()
        .get_as::<i64>()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(
        zed.is_empty(),
        "The first insert must have been rolled back"
    );

    // Cancelling the outer query rolls back what the chained one did
    let mut people = Box::pin(
        db.select("SELECT name FROM person ORDER BY name")
            .unwrap()
            .transacted()
            .get_as::<String>()
            .unwrap(),
    );
    let first = people
        .try_next()
        .await
        .unwrap()
        .expect("The person table is not empty");
    assert_eq!(first.value().map(String::as_str), Some("FRED"));
    let deleted = db
        .tx(&first)
        .select("DELETE FROM person WHERE name = ?")
        .unwrap()
        .parameters(["FRED"])
        .unwrap()
        .get(|_| Ok(()))
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert!(deleted.last().is_some_and(Tx::is_complete));
    assert_eq!(first.connection().counter(), 1);
    drop(people);
    assert!(first.connection().is_closed());
    let fred: Vec<i64> = db
        .select("SELECT score FROM person WHERE name = ?")
        .unwrap()
        .parameters(["FRED"])
        .unwrap()
        .get_as::<i64>()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(fred, [21], "The delete must have been rolled back");
}
