//! Round trip of representative values against a live database.
//!
//! For a record of primitives, nullable primitives, and an int-backed enum,
//! binding the record, executing the generated insert, and materializing the
//! row back must reproduce the original values exactly, for every
//! representative combination.
//!
//! Requires `DATABASE_URL` in the environment or a `.env` file; the test
//! skips itself otherwise.

use sqlprove::{Command, TestValues, insert_returning};

const SETUP: &str = "
    DROP TABLE IF EXISTS sample CASCADE;
    CREATE TABLE sample (
        sample_id serial PRIMARY KEY,
        n integer NOT NULL,
        big bigint NOT NULL,
        amount numeric NOT NULL,
        marker uuid NOT NULL,
        created_at timestamp NOT NULL,
        note text,
        flag boolean NOT NULL,
        status integer NOT NULL
    );
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlprove::PgEnum)]
enum SampleStatus {
    Draft = 0,
    Published = 1,
}

#[derive(
    Debug, Clone, PartialEq, sqlprove::BindParams, sqlprove::RowShape, sqlprove::TestValues,
)]
struct Sample {
    n: i32,
    big: i64,
    amount: rust_decimal::Decimal,
    marker: uuid::Uuid,
    created_at: chrono::NaiveDateTime,
    note: Option<String>,
    flag: bool,
    status: SampleStatus,
}

#[tokio::test]
async fn representative_values_survive_bind_execute_materialize() {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping live round trip: DATABASE_URL not set");
        return;
    };

    let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
        .await
        .unwrap();
    tokio::spawn(connection);
    client.batch_execute(SETUP).await.unwrap();

    sqlprove::set_connection_string_fn({
        let url = url.clone();
        move || url.clone()
    });

    // note, flag, and status each contribute two values
    let samples = Sample::test_values();
    assert_eq!(samples.len(), 8);

    for sample in samples {
        let id: i32 = insert_returning::<i32, _>("sample", sample.clone(), None)
            .await
            .unwrap()
            .read_one()
            .await
            .unwrap();

        let mut command = Command::new(
            "SELECT n, big, amount, marker, created_at, note, flag, status \
             FROM sample WHERE sample_id = @id",
        );
        command.add_param("id", &id);
        let back: Sample = command.query().read_one().await.unwrap();
        assert_eq!(back, sample);
    }

    sqlprove::clear_connection_string_fn();
}
