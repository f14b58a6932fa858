use crate::execute;
use indoc::indoc;
use rust_decimal::Decimal;
use sluice::{Connection, Database, Row, Value, stream::TryStreamExt};
use std::str::FromStr;
use time::macros::{date, datetime, time};
use uuid::Uuid;

pub async fn types<C: Connection>(db: &Database<C>) {
    execute(db, "DROP TABLE IF EXISTS sample", None::<Value>)
        .await
        .expect("Failed to drop the sample table");
    execute(
        db,
        indoc! {"
            CREATE TABLE sample (
                id BIGINT PRIMARY KEY,
                flag BOOLEAN,
                ratio DOUBLE,
                amount VARCHAR,
                label VARCHAR,
                payload BLOB,
                day DATE,
                at_time TIME,
                moment TIMESTAMP,
                uid VARCHAR
            )
        "},
        None::<Value>,
    )
    .await
    .expect("Failed to create the sample table");

    let uid = Uuid::new_v4();
    let amount = Decimal::from_str("1234.5678").unwrap();
    execute(
        db,
        indoc! {"
            INSERT INTO sample (id, flag, ratio, amount, label, payload, day, at_time, moment, uid)
            VALUES (:id, :flag, :ratio, :amount, :label, :payload, :day, :at_time, :moment, :uid)
        "},
        [
            sluice::Parameter::named("id", 1),
            sluice::Parameter::named("flag", true),
            sluice::Parameter::named("ratio", 0.25),
            sluice::Parameter::named("amount", amount),
            sluice::Parameter::named("label", "It's a 'quoted' label"),
            sluice::Parameter::named("payload", vec![0u8, 1, 2, 255]),
            sluice::Parameter::named("day", date!(2025 - 03 - 14)),
            sluice::Parameter::named("at_time", time!(13:37:42)),
            sluice::Parameter::named("moment", datetime!(1999-12-31 23:59:59.5)),
            sluice::Parameter::named("uid", uid),
            sluice::Parameter::named("id", 2),
            sluice::Parameter::named("flag", Option::<bool>::None),
            sluice::Parameter::named("ratio", Option::<f64>::None),
            sluice::Parameter::named("amount", Option::<Decimal>::None),
            sluice::Parameter::named("label", Option::<String>::None),
            sluice::Parameter::named("payload", Option::<Vec<u8>>::None),
            sluice::Parameter::named("day", Option::<time::Date>::None),
            sluice::Parameter::named("at_time", Option::<time::Time>::None),
            sluice::Parameter::named("moment", Option::<time::PrimitiveDateTime>::None),
            sluice::Parameter::named("uid", Option::<Uuid>::None),
        ],
    )
    .await
    .expect("Failed to insert the samples");

    let rows: Vec<Row> = db
        .select("SELECT * FROM sample ORDER BY id")
        .unwrap()
        .get(|row| Ok(row.clone()))
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let full = &rows[0];
    assert_eq!(full.len(), 10);
    assert_eq!(full.names()[1], "flag");
    assert_eq!(full.decode_column::<i64>("id").unwrap(), 1);
    assert!(full.decode_column::<bool>("flag").unwrap());
    assert_eq!(full.decode_column::<f64>("ratio").unwrap(), 0.25);
    assert_eq!(full.decode_column::<Decimal>("amount").unwrap(), amount);
    assert_eq!(
        full.decode_column::<String>("label").unwrap(),
        "It's a 'quoted' label"
    );
    assert_eq!(
        full.decode_column::<Vec<u8>>("payload").unwrap(),
        [0, 1, 2, 255]
    );
    assert_eq!(
        full.decode_column::<time::Date>("day").unwrap(),
        date!(2025 - 03 - 14)
    );
    assert_eq!(
        full.decode_column::<time::Time>("at_time").unwrap(),
        time!(13:37:42)
    );
    assert_eq!(
        full.decode_column::<time::PrimitiveDateTime>("moment").unwrap(),
        datetime!(1999 - 12 - 31 23:59:59.5)
    );
    assert_eq!(full.decode_column::<Uuid>("uid").unwrap(), uid);

    let empty = &rows[1];
    assert_eq!(empty.decode_column::<i64>("id").unwrap(), 2);
    for name in &empty.names()[1..] {
        assert!(
            empty.get_column(name).is_some_and(Value::is_null),
            "Column {} should be null",
            name
        );
    }
    assert_eq!(empty.decode_column::<Option<Uuid>>("uid").unwrap(), None);
    assert_eq!(
        empty.decode_column::<Option<String>>("label").unwrap(),
        None
    );

    let tuples: Vec<(i64, Option<bool>, Option<String>)> = db
        .select("SELECT id, flag, label FROM sample ORDER BY id DESC")
        .unwrap()
        .get_as()
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        tuples,
        [
            (2, None, None),
            (1, Some(true), Some("It's a 'quoted' label".into()))
        ]
    );
}
