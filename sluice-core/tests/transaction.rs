mod mock;

#[cfg(test)]
mod tests {
    use crate::mock::{Failures, MockConnection, MockSource};
    use futures::{StreamExt, TryStreamExt, future};
    use sluice_core::{ConnectionHandle, Database, Tx, query_error};

    #[tokio::test]
    async fn transacted_values_then_completed() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let items: Vec<Tx<MockConnection, i64>> = db
            .select("select score from person where name = ?")
            .unwrap()
            .parameters(["FRED", "JOSEPH"])
            .unwrap()
            .transacted()
            .get_as()
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].value(), Some(&21));
        assert_eq!(items[1].value(), Some(&34));
        assert!(items[2].is_complete());
        assert!(items[2].connection().same_as(items[0].connection()));
        assert!(items[2].connection().is_closed());
        let counts = &source.counts;
        assert_eq!(counts.begun(), 1);
        assert_eq!(counts.committed(), 1);
        assert_eq!(counts.rolled_back(), 0);
        assert_eq!(counts.disconnected(), 1);
    }

    #[tokio::test]
    async fn completed_comes_after_commit() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let counts = source.counts.clone();
        let committed: Vec<(bool, usize)> = db
            .select("select 1")
            .unwrap()
            .transacted()
            .get_as::<i64>()
            .unwrap()
            .map_ok(move |tx| (tx.is_complete(), counts.committed()))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(committed, [(false, 0), (true, 1)]);
    }

    #[tokio::test]
    async fn values_only() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let values: Vec<String> = db
            .select("select name from person where score = ?")
            .unwrap()
            .parameters([21])
            .unwrap()
            .transacted()
            .values_only()
            .get_as::<String>()
            .unwrap()
            .map_ok(|tx| tx.into_value().unwrap_or_default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values, ["FRED", "MARMADUKE"]);
        assert_eq!(source.counts.committed(), 1);
    }

    #[tokio::test]
    async fn chained_queries_share_the_connection() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let scores = db
            .select("select score from person where name = ?")
            .unwrap()
            .parameters(["FRED", "JOSEPH"])
            .unwrap()
            .transacted()
            .values_only()
            .get_as::<i64>()
            .unwrap();
        let chained = db.clone();
        let names: Vec<String> = scores
            .map(move |tx| {
                let tx = tx?;
                let score = tx.value().copied().unwrap_or_default();
                assert!(tx.connection().counter() >= 1);
                chained
                    .tx(&tx)
                    .select("select name from person where score = ?")?
                    .parameters([score])?
                    .values_only()
                    .get_as::<String>()
            })
            .try_flatten()
            .map_ok(|tx| tx.into_value().unwrap_or_default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, ["FRED", "MARMADUKE", "JOSEPH"]);
        let counts = &source.counts;
        assert_eq!(
            counts.connected(),
            1,
            "Every query ran on the same connection"
        );
        assert_eq!(counts.begun(), 1);
        assert_eq!(counts.committed(), 1);
        assert_eq!(counts.disconnected(), 1);
        assert_eq!(counts.prepared(), 3);
        assert_eq!(counts.statements_closed(), 3);
    }

    #[tokio::test]
    async fn error_in_chain_rolls_back() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let scores = db
            .select("select score from person where name = ?")
            .unwrap()
            .parameters(["FRED", "JOSEPH"])
            .unwrap()
            .transacted()
            .values_only()
            .get_as::<i64>()
            .unwrap();
        let chained = db.clone();
        let error = scores
            .map(move |tx| {
                let tx = tx?;
                chained
                    .tx(&tx)
                    .select("select name from missing where score = ?")?
                    .parameters([tx.into_value().unwrap_or_default()])?
                    .get_as::<String>()
            })
            .try_flatten()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(query_error(&error).unwrap().is_execution());
        let counts = &source.counts;
        assert_eq!(counts.committed(), 0);
        assert_eq!(counts.rolled_back(), 1);
        assert_eq!(counts.disconnected(), 1);
    }

    #[tokio::test]
    async fn cancelled_transaction_rolls_back() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let mut rows = Box::pin(
            db.select("select name, score from person")
                .unwrap()
                .transacted()
                .get_as::<(String, i64)>()
                .unwrap(),
        );
        let first = rows.try_next().await.unwrap().and_then(Tx::into_value);
        assert_eq!(first, Some(("FRED".to_string(), 21)));
        drop(rows);
        let counts = &source.counts;
        assert_eq!(counts.committed(), 0);
        assert_eq!(counts.rolled_back(), 1);
        assert_eq!(counts.cursors_closed(), 1);
        assert_eq!(counts.statements_closed(), 1);
        assert_eq!(counts.disconnected(), 1);
    }

    #[tokio::test]
    async fn rollback_failure_keeps_the_original_error() {
        let source = MockSource::failing(Failures {
            fetch: Some(2),
            rollback: true,
            ..Default::default()
        });
        let db = Database::new(source.clone());
        let error = db
            .select("select name, score from person")
            .unwrap()
            .transacted()
            .get_as::<(String, i64)>()
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(query_error(&error).unwrap().is_execution());
        let message = format!("{:#}", error);
        assert!(message.contains("Disk I/O error"), "{}", message);
        assert!(message.contains("Rollback failed"), "{}", message);
        assert_eq!(source.counts.disconnected(), 1);
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let source = MockSource::failing(Failures {
            commit: true,
            ..Default::default()
        });
        let db = Database::new(source.clone());
        let items: Vec<_> = db
            .select("select 1")
            .unwrap()
            .transacted()
            .get_as::<i64>()
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let error = items[1].as_ref().err().unwrap();
        assert!(query_error(error).unwrap().is_execution());
        assert_eq!(source.counts.rolled_back(), 1);
        assert_eq!(source.counts.disconnected(), 1);
    }

    #[tokio::test]
    async fn closed_connection_cannot_be_joined() {
        let source = MockSource::new();
        let db = Database::new(source.clone());
        let items: Vec<Tx<MockConnection, i64>> = db
            .select("select 1")
            .unwrap()
            .transacted()
            .get_as()
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let completed = items.last().unwrap();
        assert!(completed.connection().is_closed());
        let error = db
            .tx(completed)
            .select("select 1")
            .unwrap()
            .get_as::<i64>()
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(query_error(&error).unwrap().is_execution());
        assert_eq!(source.counts.connected(), 1);
    }

    #[tokio::test]
    async fn standalone_handle() {
        let source = MockSource::new();
        let opener = source.clone();
        let handle = ConnectionHandle::<MockConnection>::transacted(move || {
            sluice_core::ConnectionSource::connection(&opener)
        });
        let lease = handle.acquire().unwrap();
        let items: Vec<_> = sluice_core::TxDatabase::new(handle.clone())
            .select("select name from person where score = ?")
            .unwrap()
            .parameters([34])
            .unwrap()
            .get_as::<String>()
            .unwrap()
            .try_filter(|tx| future::ready(tx.is_value()))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            source.counts.committed(),
            0,
            "The outer lease is still held"
        );
        lease.release(sluice_core::Outcome::Success).unwrap();
        assert_eq!(source.counts.committed(), 1);
        assert_eq!(source.counts.disconnected(), 1);
    }
}
