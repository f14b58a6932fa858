#[cfg(test)]
mod tests {
    use sluice::{Database, Parameter, Tx, Value, stream::StreamExt, stream::TryStreamExt};
    use sluice_sqlite::SqliteSource;
    use sluice_tests::init_logs;
    use std::path::Path;

    #[tokio::test]
    async fn readme() -> sluice::Result<()> {
        init_logs();
        const DB_PATH: &'static str = "target/debug/readme.sqlite";
        if Path::new(DB_PATH).exists() {
            std::fs::remove_file(DB_PATH)?;
        }
        let db = Database::new(SqliteSource::new(format!("sqlite://{}?mode=rwc", DB_PATH)));

        db.select("CREATE TABLE person (name VARCHAR PRIMARY KEY, score BIGINT)")?
            .get(|_| Ok(()))?
            .try_collect::<Vec<_>>()
            .await?;
        db.select("INSERT INTO person VALUES (:name, :score)")?
            .parameters([
                Parameter::named("name", "FRED"),
                Parameter::named("score", 21),
                Parameter::named("score", 34),
                Parameter::named("name", "JOSEPH"),
            ])?
            .get(|_| Ok(()))?
            .try_collect::<Vec<_>>()
            .await?;

        let scores: Vec<i64> = db
            .select("SELECT score FROM person WHERE name = ?")?
            .parameters(["FRED", "JOSEPH"])?
            .get_as::<i64>()?
            .try_collect()
            .await?;
        assert_eq!(scores, [21, 34]);

        // Every query below runs on the same connection and commits once
        let chained = db.clone();
        let names: Vec<String> = db
            .select("SELECT score FROM person WHERE name = ?")?
            .parameters(["FRED", "JOSEPH"])?
            .transacted()
            .values_only()
            .get_as::<i64>()?
            .map(move |tx| {
                let tx = tx?;
                let score = tx.value().copied().map(Value::from).unwrap_or_default();
                chained
                    .tx(&tx)
                    .select("SELECT name FROM person WHERE score = ?")?
                    .parameters([score])?
                    .values_only()
                    .get_as::<String>()
            })
            .try_flatten()
            .try_filter_map(|tx: Tx<_, String>| async move { Ok(tx.into_value()) })
            .try_collect()
            .await?;
        assert_eq!(names, ["FRED", "JOSEPH"]);
        Ok(())
    }
}
