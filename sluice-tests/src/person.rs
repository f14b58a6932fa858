use crate::execute;
use indoc::indoc;
use sluice::{
    Connection, Database, Parameter, Value,
    stream::{self, StreamExt, TryStreamExt},
};

pub async fn person_setup<C: Connection>(db: &Database<C>) {
    execute(db, "DROP TABLE IF EXISTS person", None::<Value>)
        .await
        .expect("Failed to drop the person table");
    execute(
        db,
        indoc! {"
            CREATE TABLE person (
                name VARCHAR PRIMARY KEY,
                score BIGINT NOT NULL
            )
        "},
        None::<Value>,
    )
    .await
    .expect("Failed to create the person table");
    execute(
        db,
        "INSERT INTO person (name, score) VALUES (?, ?)",
        [
            Value::from("FRED"),
            Value::from(21),
            Value::from("JOSEPH"),
            Value::from(34),
        ],
    )
    .await
    .expect("Failed to insert the people");
}

pub async fn person<C: Connection>(db: &Database<C>) {
    // Positional
    let scores: Vec<i64> = db
        .select("SELECT score FROM person WHERE name = ?")
        .expect("Could not parse the query")
        .parameters(["FRED", "JOSEPH"])
        .expect("Could not bind the parameters")
        .get_as::<i64>()
        .expect("Could not build the query")
        .try_collect()
        .await
        .expect("Could not run the query");
    assert_eq!(scores, [21, 34]);

    // Named, one value at a time
    let scores: Vec<i64> = db
        .select("SELECT score FROM person WHERE name = :name")
        .unwrap()
        .parameter("name", "JOSEPH")
        .unwrap()
        .parameter("name", "FRED")
        .unwrap()
        .get_as::<i64>()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(scores, [34, 21]);

    // Named, flat list
    let people: Vec<(String, i64)> = db
        .select(indoc! {"
            SELECT name, score FROM person
            WHERE score >= :low AND score < :high -- :ignored
            ORDER BY name
        "})
        .unwrap()
        .parameters([Parameter::named("high", 100), Parameter::named("low", 0)])
        .unwrap()
        .get_as()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        people,
        [("FRED".to_string(), 21), ("JOSEPH".to_string(), 34)]
    );

    // Streamed groups
    let names: Vec<String> = db
        .select("SELECT name FROM person WHERE score = ?")
        .unwrap()
        .parameter_list([34])
        .unwrap()
        .parameter_stream(stream::iter([Ok(vec![21]), Ok(vec![99])]))
        .unwrap()
        .get(|row| row.decode_column("name"))
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(names, ["JOSEPH", "FRED"]);

    // Early stop
    let first: Vec<String> = db
        .select("SELECT name FROM person ORDER BY score DESC")
        .unwrap()
        .get_as()
        .unwrap()
        .take(1)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(first, ["JOSEPH"]);

    // Zero rows
    let nobody: Vec<String> = db
        .select("SELECT name FROM person WHERE score > ?")
        .unwrap()
        .parameters([1000])
        .unwrap()
        .get_as()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(nobody.is_empty());
}
