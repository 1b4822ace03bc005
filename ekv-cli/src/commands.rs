//! Subcommand execution. Output goes to the given writer so tests can capture it.

use std::io::Write;

use anyhow::Result;
use clap::Subcommand;
use futures_util::StreamExt;

use ekv_client::Executor;
use ekv_store::{KvNamespace, KvValue, ListOptions, PutOptions, ValueKind};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a value
    Put {
        key: String,
        value: String,
        /// Expire this many seconds after the write
        #[arg(long)]
        ttl: Option<i64>,
        /// Expire at this Unix epoch second (ignored when --ttl is given)
        #[arg(long)]
        expiration: Option<i64>,
    },
    /// Read a value
    Get {
        key: String,
        /// Representation: text, arrayBuffer, json, stream
        #[arg(long = "type", default_value = "text")]
        kind: String,
    },
    /// List keys as JSON
    List {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, conflicts_with = "all")]
        limit: Option<usize>,
        #[arg(long, conflicts_with = "all")]
        cursor: Option<String>,
        /// Follow cursors until the walk completes and print only key names
        #[arg(long)]
        all: bool,
    },
    /// Print the store TTL reply for a key (-1 no expiry, -2 missing)
    Ttl { key: String },
    /// Delete a key
    Delete { key: String },
    /// Check that the store answers
    Ping,
}

pub async fn run<E: Executor>(kv: &KvNamespace<E>, command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Put {
            key,
            value,
            ttl,
            expiration,
        } => {
            let options = PutOptions {
                expiration_ttl: ttl,
                expiration,
            };
            if kv.put(&key, value, options).await? {
                writeln!(out, "OK")?;
            } else {
                writeln!(out, "not written: expiration is not in the future")?;
            }
        }
        Commands::Get { key, kind } => {
            let kind: ValueKind = kind.parse()?;
            match kv.get(&key, kind).await? {
                Some(value) => print_value(value, out).await?,
                None => writeln!(out, "(nil)")?,
            }
        }
        Commands::List {
            prefix,
            limit,
            cursor,
            all,
        } => {
            if all {
                let names = kv.list_all(prefix.as_deref().unwrap_or("")).await?;
                writeln!(out, "{}", serde_json::to_string_pretty(&names)?)?;
            } else {
                let page = kv.list(ListOptions { prefix, limit, cursor }).await?;
                writeln!(out, "{}", serde_json::to_string_pretty(&page)?)?;
            }
        }
        Commands::Ttl { key } => writeln!(out, "{}", kv.get_ttl(&key).await?)?,
        Commands::Delete { key } => {
            kv.delete(&key).await?;
            writeln!(out, "deleted {key}")?;
        }
        Commands::Ping => writeln!(out, "{}", kv.ping().await?)?,
    }
    Ok(())
}

async fn print_value(value: KvValue, out: &mut impl Write) -> Result<()> {
    match value {
        KvValue::Text(text) => writeln!(out, "{text}")?,
        KvValue::Bytes(bytes) => out.write_all(&bytes)?,
        KvValue::Json(json) => writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?,
        KvValue::Stream(mut stream) => {
            while let Some(chunk) = stream.next().await {
                out.write_all(&chunk?)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekv_client::LocalExecutor;
    use ekv_common::EkvError;

    async fn run_to_string(kv: &KvNamespace<LocalExecutor>, command: Commands) -> Result<String> {
        let mut out = Vec::new();
        run(kv, command, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    fn put(key: &str, value: &str) -> Commands {
        Commands::Put {
            key: key.into(),
            value: value.into(),
            ttl: None,
            expiration: None,
        }
    }

    fn get(key: &str, kind: &str) -> Commands {
        Commands::Get {
            key: key.into(),
            kind: kind.into(),
        }
    }

    #[tokio::test]
    async fn put_then_get_in_each_representation() {
        let kv = KvNamespace::new(LocalExecutor::in_memory());
        assert_eq!(run_to_string(&kv, put("doc", r#"{"n":1}"#)).await.unwrap(), "OK\n");

        assert_eq!(run_to_string(&kv, get("doc", "text")).await.unwrap(), "{\"n\":1}\n");
        assert_eq!(run_to_string(&kv, get("doc", "arrayBuffer")).await.unwrap(), "{\"n\":1}");
        assert_eq!(run_to_string(&kv, get("doc", "stream")).await.unwrap(), "{\"n\":1}");
        assert_eq!(run_to_string(&kv, get("doc", "json")).await.unwrap(), "{\n  \"n\": 1\n}\n");
        assert_eq!(run_to_string(&kv, get("gone", "text")).await.unwrap(), "(nil)\n");
    }

    #[tokio::test]
    async fn unknown_type_is_an_invalid_argument() {
        let kv = KvNamespace::new(LocalExecutor::in_memory());
        let err = run_to_string(&kv, get("doc", "blob")).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<EkvError>(), Some(EkvError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn past_expiration_is_reported_not_failed() {
        let kv = KvNamespace::new(LocalExecutor::in_memory());
        let command = Commands::Put {
            key: "k".into(),
            value: "v".into(),
            ttl: None,
            expiration: Some(1),
        };
        let output = run_to_string(&kv, command).await.unwrap();
        assert!(output.starts_with("not written"));
        assert_eq!(run_to_string(&kv, Commands::Ttl { key: "k".into() }).await.unwrap(), "-2\n");
    }

    #[tokio::test]
    async fn list_prints_page_json() {
        let kv = KvNamespace::new(LocalExecutor::in_memory());
        run_to_string(&kv, put("a:1", "x")).await.unwrap();
        run_to_string(&kv, put("a:2", "x")).await.unwrap();
        run_to_string(&kv, put("b:1", "x")).await.unwrap();

        let output = run_to_string(
            &kv,
            Commands::List {
                prefix: Some("a:".into()),
                limit: None,
                cursor: None,
                all: false,
            },
        )
        .await
        .unwrap();
        let page: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(page["list_complete"], true);
        assert_eq!(page["cursor"], "0");
        assert_eq!(page["keys"][0]["name"], "a:1");
        assert_eq!(page["keys"][1]["ttl"], -1);

        let output = run_to_string(
            &kv,
            Commands::List {
                prefix: None,
                limit: None,
                cursor: None,
                all: true,
            },
        )
        .await
        .unwrap();
        let names: Vec<String> = serde_json::from_str(&output).unwrap();
        assert_eq!(names, ["a:1", "a:2", "b:1"]);
    }

    #[derive(clap::Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn list_all_rejects_paging_flags() {
        use clap::Parser;

        assert!(Harness::try_parse_from(["ekv", "list", "--all", "--limit", "5"]).is_err());
        assert!(Harness::try_parse_from(["ekv", "list", "--all", "--cursor", "12"]).is_err());
        let parsed = Harness::try_parse_from(["ekv", "list", "--all", "--prefix", "a:"]).unwrap();
        assert!(matches!(parsed.command, Commands::List { all: true, .. }));
        assert!(Harness::try_parse_from(["ekv", "list", "--limit", "5", "--cursor", "12"]).is_ok());
    }

    #[tokio::test]
    async fn delete_missing_key_fails_with_not_found() {
        let kv = KvNamespace::new(LocalExecutor::in_memory());
        run_to_string(&kv, put("k", "v")).await.unwrap();
        assert_eq!(run_to_string(&kv, Commands::Delete { key: "k".into() }).await.unwrap(), "deleted k\n");

        let err = run_to_string(&kv, Commands::Delete { key: "k".into() }).await.unwrap_err();
        assert_eq!(err.downcast_ref::<EkvError>().map(EkvError::code), Some(2));
        assert_eq!(run_to_string(&kv, Commands::Ping).await.unwrap(), "PONG\n");
    }
}
