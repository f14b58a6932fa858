use crate::silent_logs;
use sluice::{Connection, Database, Parameter, QueryError, query_error, stream::TryStreamExt};

fn is_configuration(error: &sluice::Error) -> bool {
    query_error(error).is_some_and(QueryError::is_configuration)
}

pub async fn errors<C: Connection>(db: &Database<C>) {
    silent_logs! {
        // Values but no placeholders
        let error = db
            .select("SELECT score FROM person")
            .unwrap()
            .parameters(["FRED", "JOSEPH"])
            .err()
            .expect("Binding values to a query without parameters should fail");
        assert!(is_configuration(&error));

        // Not a multiple of the parameter count
        let error = db
            .select("SELECT name FROM person WHERE score > ? AND score < ?")
            .unwrap()
            .parameters([1, 2, 3])
            .err()
            .expect("Three values cannot fill groups of two");
        assert!(is_configuration(&error));

        // Unnamed values against named placeholders
        let error = db
            .select("SELECT score FROM person WHERE name = :name")
            .unwrap()
            .parameters(["FRED"])
            .err()
            .expect("Named placeholders need named values");
        assert!(is_configuration(&error));

        // Mixed binding modes
        let error = db
            .select("SELECT score FROM person WHERE name = :name")
            .unwrap()
            .parameter("name", "FRED")
            .unwrap()
            .parameters([Parameter::named("name", "JOSEPH")])
            .err()
            .expect("Mixing named and flat binding should fail");
        assert!(is_configuration(&error));

        // Missing values
        let error = db
            .select("SELECT score FROM person WHERE name = ?")
            .unwrap()
            .get_as::<i64>()
            .err()
            .expect("A query with parameters needs values");
        assert!(is_configuration(&error));

        // Malformed and mixed placeholders
        let error = db
            .select("SELECT score FROM person WHERE name = : name")
            .err()
            .expect("An empty parameter name is malformed");
        assert!(query_error(&error).is_some_and(QueryError::is_syntax));
        let error = db
            .select("SELECT score FROM person WHERE name = :name OR score = ?")
            .err()
            .expect("Mixed placeholders are malformed");
        assert!(query_error(&error).is_some_and(QueryError::is_syntax));

        // Driver failure
        let error = db
            .select("SELECT score FROM missing_table")
            .unwrap()
            .get_as::<i64>()
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .expect_err("Selecting from a missing table should fail");
        assert!(query_error(&error).is_some_and(QueryError::is_execution));

        // Decoding failure
        let error = db
            .select("SELECT name FROM person")
            .unwrap()
            .get_as::<i64>()
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .expect_err("A name is not a number");
        assert!(query_error(&error).is_some_and(QueryError::is_mapping));
    }
}
