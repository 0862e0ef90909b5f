#![allow(dead_code)]

use pgcompose::{DbError, DbResult};
use tokio::sync::OnceCell;
use tokio_postgres::{Client, NoTls};

static SEEDED: OnceCell<()> = OnceCell::const_new();

/// The connection string from the environment (or `.env`), if any.
pub fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").ok()
}

/// Connect, or `None` when `DATABASE_URL` is not set.
pub async fn connect() -> DbResult<Option<Client>> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL is not set; skipping");
        return Ok(None);
    };
    let (client, connection) = tokio_postgres::connect(&url, NoTls)
        .await
        .map_err(DbError::from_db_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(Some(client))
}

/// Connect and make sure the shop fixture exists in `schema`.
///
/// The fixture is rebuilt once per test binary.
pub async fn shop(schema: &str) -> DbResult<Option<Client>> {
    let Some(client) = connect().await? else {
        return Ok(None);
    };
    SEEDED.get_or_try_init(|| seed(&client, schema)).await?;
    Ok(Some(client))
}

/// Drop and recreate the shop tables in `schema`.
pub async fn seed(client: &Client, schema: &str) -> DbResult<()> {
    client
        .batch_execute(&fixture(schema))
        .await
        .map_err(DbError::from_db_error)
}

fn fixture(s: &str) -> String {
    format!(
        r#"
DROP SCHEMA IF EXISTS "{s}" CASCADE;
CREATE SCHEMA "{s}";

CREATE TABLE "{s}"."user" (
    id serial PRIMARY KEY,
    first_name text NOT NULL,
    last_name text NOT NULL,
    favorite_color text
);

CREATE TABLE "{s}".product (
    id serial PRIMARY KEY,
    description text NOT NULL
);

CREATE TABLE "{s}"."order" (
    id serial PRIMARY KEY,
    user_id integer NOT NULL REFERENCES "{s}"."user" (id),
    created_at timestamptz NOT NULL DEFAULT now()
);

CREATE TABLE "{s}".order_item (
    id serial PRIMARY KEY,
    order_id integer NOT NULL REFERENCES "{s}"."order" (id),
    user_id integer NOT NULL REFERENCES "{s}"."user" (id),
    product_id integer NOT NULL REFERENCES "{s}".product (id)
);

CREATE TABLE "{s}".favorite (
    id serial PRIMARY KEY,
    user_id integer NOT NULL UNIQUE REFERENCES "{s}"."user" (id),
    product_id integer NOT NULL REFERENCES "{s}".product (id)
);

INSERT INTO "{s}"."user" (first_name, last_name, favorite_color) VALUES
    ('Nico', 'Charpin', 'blue'),
    ('Vanina', 'Platon', 'green'),
    ('Olivier', 'Prezeau', 'red');

INSERT INTO "{s}".product (description) VALUES
    ('Le Seigneur des Anneaux'),
    ('Clavier mécanique'),
    ('Enceinte portable'),
    ('Dune, Frank Herbert'),
    ('Casque audio bluetooth');

INSERT INTO "{s}"."order" (user_id) VALUES (1), (2), (3), (1), (2);

INSERT INTO "{s}".order_item (order_id, user_id, product_id) VALUES
    (1, 1, 1),
    (1, 1, 4),
    (2, 2, 3),
    (3, 3, 5),
    (4, 1, 2),
    (5, 2, 1);
"#
    )
}
