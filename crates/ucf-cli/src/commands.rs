//! Command implementations over a JSON config dump.
//!
//! Every command drives the same client stack used against a live
//! device: the dump is loaded into the in-memory backend, operations go
//! through the transport, store client and overlay, and the resulting
//! working state is written back to the dump file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use ucf_model::{Address, SectionRecord, Value};
use ucf_overlay::EditSession;
use ucf_rpc::RpcClient;
use ucf_store::{MemoryBackend, StoreClient};
use ucf_validate::Validator;

use crate::cli::{
    AddArgs, ChangesArgs, CheckArgs, DeleteArgs, GetArgs, OrderArgs, SetArgs, ShowArgs,
};

/// Fixed session id; the in-memory backend does not authenticate.
const SESSION_ID: &str = "00000000000000000000000000000000";

/// One dump file opened through the full client stack.
pub struct Workspace {
    backend: Arc<MemoryBackend>,
    store: StoreClient,
    file: PathBuf,
}

impl Workspace {
    /// Load the dump into the in-memory backend; a missing file starts
    /// an empty store.
    pub fn open(file: &Path) -> Result<Self> {
        let backend = if file.exists() {
            let raw = fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let dump = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            MemoryBackend::from_json(&dump)
                .map_err(|reason| anyhow!("{}: {reason}", file.display()))?
        } else {
            debug!(file = %file.display(), "starting with an empty store");
            MemoryBackend::new()
        };

        let backend = Arc::new(backend);
        let rpc = Arc::new(RpcClient::new(backend.clone(), SESSION_ID));
        Ok(Self {
            backend,
            store: StoreClient::new(rpc),
            file: file.to_path_buf(),
        })
    }

    fn persist(&self) -> Result<()> {
        let dump = serde_json::to_string_pretty(&self.backend.to_json())?;
        fs::write(&self.file, dump).with_context(|| format!("writing {}", self.file.display()))
    }

    async fn session(&self, config: &str) -> Result<EditSession> {
        let mut session = EditSession::new(self.store.clone(), config);
        session.load().await?;
        Ok(session)
    }
}

pub async fn run_show(ws: &Workspace, args: &ShowArgs) -> Result<()> {
    let session = ws.session(&args.config).await?;
    for record in session.sections(&args.config) {
        if args
            .section_type
            .as_deref()
            .is_some_and(|t| t != record.section_type)
        {
            continue;
        }
        print_section(&args.config, &record);
    }
    Ok(())
}

pub async fn run_get(ws: &Workspace, args: &GetArgs) -> Result<()> {
    let value = ws
        .store
        .get(&args.config, &args.section, args.option.as_deref())
        .await?;
    match value {
        Some(value) => println!("{value}"),
        None => {
            let addr = match args.option.as_deref() {
                Some(option) => Address::option(&*args.config, &*args.section, option),
                None => Address::section(&*args.config, &*args.section),
            };
            bail!("{addr} is not set");
        }
    }
    Ok(())
}

pub async fn run_set(ws: &Workspace, args: &SetArgs) -> Result<()> {
    let value = if args.list {
        Value::from(
            args.value
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>(),
        )
    } else {
        Value::from(args.value.clone())
    };

    let mut session = ws.session(&args.config).await?;
    session
        .overlay_mut()
        .stage_set(&args.config, &args.section, &args.option, Some(value));
    session.save().await?;
    ws.persist()
}

pub async fn run_add(ws: &Workspace, args: &AddArgs) -> Result<()> {
    let mut session = ws.session(&args.config).await?;
    let temp = session.overlay_mut().stage_create(
        &args.config,
        &args.section_type,
        args.name.as_deref(),
    );
    let assigned = session.save().await?;
    let sid = assigned
        .get(&temp)
        .ok_or_else(|| anyhow!("store returned no id for the new section"))?;
    println!("{sid}");
    ws.persist()
}

pub async fn run_delete(ws: &Workspace, args: &DeleteArgs) -> Result<()> {
    let mut session = ws.session(&args.config).await?;
    match &args.option {
        Some(option) => {
            session
                .overlay_mut()
                .stage_delete(&args.config, &args.section, Some(option));
        }
        None => {
            session
                .overlay_mut()
                .stage_remove_section(&args.config, &args.section);
        }
    }
    session.save().await?;
    ws.persist()
}

pub async fn run_order(ws: &Workspace, args: &OrderArgs) -> Result<()> {
    let mut session = ws.session(&args.config).await?;
    session
        .overlay_mut()
        .stage_reorder(&args.config, &args.sections);
    session.save().await?;
    ws.persist()
}

pub async fn run_changes(ws: &Workspace, args: &ChangesArgs) -> Result<()> {
    match &args.config {
        Some(config) => {
            for row in ws.store.changes(config).await? {
                println!("{config}: {}", row.join(" "));
            }
        }
        None => {
            for (config, rows) in ws.store.changes_all().await? {
                for row in rows {
                    println!("{config}: {}", row.join(" "));
                }
            }
        }
    }
    Ok(())
}

pub async fn run_commit(ws: &Workspace, args: &ChangesArgs) -> Result<()> {
    ws.store.commit(args.config.as_deref()).await?;
    ws.persist()
}

/// Returns the process exit code: 0 when the value passes.
pub fn run_check(args: &CheckArgs) -> Result<i32> {
    let validator = Validator::compile(&args.datatype)
        .with_context(|| format!("compiling '{}'", args.datatype))?;
    match validator.validate(&args.value) {
        Ok(()) => {
            println!("ok");
            Ok(0)
        }
        Err(message) => {
            println!("{message}");
            Ok(1)
        }
    }
}

fn print_section(config: &str, record: &SectionRecord) {
    println!("{config}.{}={}", record.id, record.section_type);
    for (option, value) in &record.options {
        println!("{config}.{}.{option}='{}'", record.id, value.as_scalar());
    }
}
