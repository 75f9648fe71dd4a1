use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use depot_blob::{BlobStore, FsBlobStore};
use depot_data::{CsvAdapter, JsonAdapter};
use depot_types::BlobKey;
use serde_json::{json, Map, Value};

use crate::cli::*;
use crate::config::DepotConfig;

/// Open stores shared by every command.
struct Depot {
    store: Arc<dyn BlobStore>,
    json: JsonAdapter,
    csv: CsvAdapter,
    format: OutputFormat,
}

impl Depot {
    async fn open(config: DepotConfig, format: OutputFormat) -> anyhow::Result<Self> {
        let root = config.store.root.clone();
        let store: Arc<dyn BlobStore> = Arc::new(
            FsBlobStore::open(config.store)
                .await
                .with_context(|| format!("cannot open store at {}", root.display()))?,
        );
        Ok(Self {
            json: JsonAdapter::with_options(Arc::clone(&store), config.json),
            csv: CsvAdapter::with_options(Arc::clone(&store), config.csv),
            store,
            format,
        })
    }

    /// Print a command result as colored text or as one JSON line.
    fn report(&self, json: Value, text: impl FnOnce()) {
        match self.format {
            OutputFormat::Text => text(),
            OutputFormat::Json => println!("{json}"),
        }
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = DepotConfig::load(cli.config.as_deref())?.with_root(cli.root);
    let depot = Depot::open(config, cli.format).await?;
    match cli.command {
        Command::Blob(BlobCommand::Put(args)) => cmd_blob_put(&depot, args).await,
        Command::Blob(BlobCommand::Get(args)) => cmd_blob_get(&depot, args).await,
        Command::Blob(BlobCommand::Rm(args)) => cmd_blob_rm(&depot, args).await,
        Command::Blob(BlobCommand::Ls(args)) => cmd_blob_ls(&depot, args).await,
        Command::Json(JsonCommand::Get(args)) => cmd_json_get(&depot, args).await,
        Command::Json(JsonCommand::Put(args)) => cmd_json_put(&depot, args).await,
        Command::Csv(CsvCommand::Import(args)) => cmd_csv_import(&depot, args).await,
        Command::Csv(CsvCommand::Export(args)) => cmd_csv_export(&depot, args).await,
    }
}

fn parse_key(key: &str) -> anyhow::Result<BlobKey> {
    Ok(BlobKey::new(key)?)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

async fn cmd_blob_put(depot: &Depot, args: BlobPutArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let bytes = read_file(&args.file)?;
    let size = bytes.len();
    depot.store.upload(&key, bytes.into()).await?;
    depot.report(json!({"key": key.as_str(), "bytes": size}), || {
        println!("{} Uploaded {} ({} bytes)", "✓".green().bold(), key.as_str().bold(), size);
    });
    Ok(())
}

async fn cmd_blob_get(depot: &Depot, args: BlobGetArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let Some(bytes) = depot.store.download(&key).await? else {
        bail!("blob {key} not found");
    };
    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("cannot write {}", path.display()))?;
            depot.report(
                json!({"key": key.as_str(), "bytes": bytes.len(), "output": path.display().to_string()}),
                || {
                    println!(
                        "{} Downloaded {} to {} ({} bytes)",
                        "✓".green().bold(),
                        key.as_str().bold(),
                        path.display(),
                        bytes.len()
                    );
                },
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_blob_rm(depot: &Depot, args: KeyArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    depot.store.delete(&key).await?;
    depot.report(json!({"key": key.as_str(), "deleted": true}), || {
        println!("{} Deleted {}", "✓".green().bold(), key.as_str().bold());
    });
    Ok(())
}

async fn cmd_blob_ls(depot: &Depot, args: BlobLsArgs) -> anyhow::Result<()> {
    let keys = depot.store.list(&args.prefix).await?;
    let names: Vec<&str> = keys.iter().map(BlobKey::as_str).collect();
    depot.report(json!(names), || {
        for name in &names {
            println!("{name}");
        }
        println!("{}", format!("{} key(s)", names.len()).dimmed());
    });
    Ok(())
}

async fn cmd_json_get(depot: &Depot, args: KeyArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let Some(doc) = depot.json.download_json::<Value>(&key).await? else {
        bail!("document {key} not found");
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

async fn cmd_json_put(depot: &Depot, args: JsonPutArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let raw = read_file(&args.file)?;
    let doc: Value = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;
    depot.json.upload_json(&key, &doc).await?;
    depot.report(json!({"key": key.as_str()}), || {
        println!("{} Stored document {}", "✓".green().bold(), key.as_str().bold());
    });
    Ok(())
}

async fn cmd_csv_import(depot: &Depot, args: CsvImportArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let raw = read_file(&args.file)?;
    let records: Vec<Map<String, Value>> = serde_json::from_slice(&raw).with_context(|| {
        format!("{} must hold a JSON array of objects", args.file.display())
    })?;
    depot.csv.upload_csv(&key, &records).await?;
    depot.report(json!({"key": key.as_str(), "records": records.len()}), || {
        println!(
            "{} Imported {} record(s) into {}",
            "✓".green().bold(),
            records.len(),
            key.as_str().bold()
        );
    });
    Ok(())
}

async fn cmd_csv_export(depot: &Depot, args: KeyArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let Some(records) = depot.csv.download_csv::<Map<String, Value>>(&key).await? else {
        bail!("collection {key} not found");
    };
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("empty.toml"), "").unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        async fn run(&self, args: &[&str]) -> anyhow::Result<()> {
            let root = self.path("store");
            let config = self.path("empty.toml");
            let mut argv = vec!["depot", "--root", root.as_str(), "--config", config.as_str()];
            argv.extend_from_slice(args);
            run_command(Cli::try_parse_from(argv)?).await
        }

        async fn store(&self) -> FsBlobStore {
            let config = DepotConfig::default().with_root(Some(self.dir.path().join("store")));
            FsBlobStore::open(config.store).await.unwrap()
        }
    }

    fn key(s: &str) -> BlobKey {
        BlobKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn blob_put_get_rm() {
        let fx = Fixture::new();
        std::fs::write(fx.path("in.bin"), b"\x00\x01payload").unwrap();

        fx.run(&["blob", "put", "raw/in.bin", &fx.path("in.bin")]).await.unwrap();
        fx.run(&["blob", "get", "raw/in.bin", "-o", &fx.path("out.bin")])
            .await
            .unwrap();
        assert_eq!(std::fs::read(fx.path("out.bin")).unwrap(), b"\x00\x01payload");

        fx.run(&["blob", "ls", "raw/"]).await.unwrap();
        fx.run(&["blob", "rm", "raw/in.bin"]).await.unwrap();
        assert!(fx.store().await.download(&key("raw/in.bin")).await.unwrap().is_none());

        // Deleting again succeeds.
        fx.run(&["blob", "rm", "raw/in.bin"]).await.unwrap();
    }

    #[tokio::test]
    async fn blob_get_of_missing_key_fails() {
        let fx = Fixture::new();
        let err = fx.run(&["blob", "get", "missing-key"]).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn invalid_key_is_rejected() {
        let fx = Fixture::new();
        assert!(fx.run(&["blob", "rm", "../escape"]).await.is_err());
    }

    #[tokio::test]
    async fn json_put_validates_before_storing() {
        let fx = Fixture::new();
        std::fs::write(fx.path("bad.json"), "{not json").unwrap();
        let err = fx.run(&["json", "put", "users/1.json", &fx.path("bad.json")]).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        assert!(fx.store().await.list("").await.unwrap().is_empty());

        std::fs::write(fx.path("ana.json"), r#"{"name":"Ana","age":30}"#).unwrap();
        fx.run(&["json", "put", "users/1.json", &fx.path("ana.json")]).await.unwrap();
        fx.run(&["--format", "json", "json", "get", "users/1.json"]).await.unwrap();

        let stored = fx.store().await.download(&key("users/1.json")).await.unwrap().unwrap();
        let doc: Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(doc, json!({"name": "Ana", "age": 30}));
    }

    #[tokio::test]
    async fn csv_import_writes_header_in_field_order() {
        let fx = Fixture::new();
        std::fs::write(
            fx.path("people.json"),
            r#"[{"name":"Ana","age":30,"member":true},{"name":"Bo","age":12,"member":false}]"#,
        )
        .unwrap();
        fx.run(&["csv", "import", "people.csv", &fx.path("people.json")]).await.unwrap();

        let raw = fx.store().await.download(&key("people.csv")).await.unwrap().unwrap();
        let text = std::str::from_utf8(&raw).unwrap();
        assert_eq!(text, "name,age,member\nAna,30,true\nBo,12,false\n");

        fx.run(&["csv", "export", "people.csv"]).await.unwrap();
    }

    #[tokio::test]
    async fn csv_import_rejects_nested_fields() {
        let fx = Fixture::new();
        std::fs::write(fx.path("nested.json"), r#"[{"name":"Ana","tags":["a"]}]"#).unwrap();
        assert!(fx
            .run(&["csv", "import", "nested.csv", &fx.path("nested.json")])
            .await
            .is_err());
        assert!(fx.store().await.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn csv_export_of_missing_collection_fails() {
        let fx = Fixture::new();
        assert!(fx.run(&["csv", "export", "nothing.csv"]).await.is_err());
    }
}
