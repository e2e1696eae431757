//! Query macros check their SQL against a live schema while compiling. Build that
//! schema from `migrations/` into `OUT_DIR` and point `DATABASE_URL` at it.

use std::{env, fs, path::PathBuf, str::FromStr};

use sqlx::{
    Connection,
    sqlite::{SqliteConnectOptions, SqliteConnection},
};

fn main() {
    println!("cargo:rerun-if-changed=migrations");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let db_path = out_dir.join("schema.sqlite");
    let _ = fs::remove_file(&db_path);
    let database_url = format!("sqlite://{}", db_path.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start build runtime");
    runtime
        .block_on(async {
            let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
            let mut conn = SqliteConnection::connect_with(&options).await?;
            sqlx::migrate!("./migrations").run(&mut conn).await?;
            conn.close().await?;
            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .expect("failed to build the schema database from migrations");

    println!("cargo:rustc-env=DATABASE_URL={database_url}");
}
