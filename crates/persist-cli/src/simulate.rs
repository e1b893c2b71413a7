//! # Simulate Subcommand
//!
//! Runs a YAML event script against a [`Session`] and prints the state of
//! every named object after each step. A failing step is reported and the
//! script continues.
//!
//! ```yaml
//! classes:
//!   - class_name: bank.Account
//!     identity_type: application
//!     fields:
//!       - { name: number, primary_key: true }
//!       - { name: owner }
//! steps:
//!   - op: begin
//!   - { op: persist, object: acct, class: bank.Account, values: [A-1, ada] }
//!   - op: commit
//!   - op: reopen
//!   - op: begin
//!   - { op: read, object: acct, field: owner }
//!   - op: commit
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use persist_core::{ClassMetaData, FetchPlan, ObjectId, PersistenceConfig};
use persist_state::{MemoryDatastore, Session};

/// Arguments for `persist simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to the YAML event script.
    pub script: PathBuf,

    /// Exit with status 1 if any step failed.
    #[arg(long)]
    pub strict: bool,
}

/// A parsed event script.
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub classes: Vec<ClassMetaData>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("parsing simulation script")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::from_yaml_str(&content)
    }
}

/// One scripted event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Begin,
    Commit,
    Rollback,
    /// Open a fresh session over the same datastore; stored objects come
    /// back `HOLLOW`.
    Reopen,
    Persist {
        object: String,
        class: String,
        #[serde(default)]
        values: Vec<Value>,
    },
    Transient {
        object: String,
        class: String,
        #[serde(default)]
        values: Vec<Value>,
    },
    Read {
        object: String,
        field: String,
    },
    Write {
        object: String,
        field: String,
        value: Value,
    },
    Delete {
        object: String,
    },
    MakePersistent {
        object: String,
    },
    MakeTransactional {
        object: String,
        #[serde(default)]
        refresh: bool,
    },
    MakeNontransactional {
        object: String,
    },
    MakeTransient {
        object: String,
        #[serde(default)]
        use_fetch_plan: bool,
    },
    Retrieve {
        object: String,
        #[serde(default)]
        fg_only: bool,
        /// Explicit fetch groups; overrides `fg_only`.
        #[serde(default)]
        groups: Option<Vec<String>>,
    },
    Refresh {
        object: String,
    },
    Evict {
        object: String,
    },
    Detach {
        object: String,
    },
    Attach {
        object: String,
    },
    Serialize {
        object: String,
    },
}

impl Step {
    /// Short description for output.
    pub fn label(&self) -> String {
        match self {
            Self::Begin => "begin".into(),
            Self::Commit => "commit".into(),
            Self::Rollback => "rollback".into(),
            Self::Reopen => "reopen".into(),
            Self::Persist { object, class, .. } => format!("persist {object}: {class}"),
            Self::Transient { object, class, .. } => format!("transient {object}: {class}"),
            Self::Read { object, field } => format!("read {object}.{field}"),
            Self::Write { object, field, value } => format!("write {object}.{field} = {value}"),
            Self::Delete { object } => format!("delete {object}"),
            Self::MakePersistent { object } => format!("make-persistent {object}"),
            Self::MakeTransactional { object, .. } => format!("make-transactional {object}"),
            Self::MakeNontransactional { object } => format!("make-nontransactional {object}"),
            Self::MakeTransient { object, .. } => format!("make-transient {object}"),
            Self::Retrieve { object, .. } => format!("retrieve {object}"),
            Self::Refresh { object } => format!("refresh {object}"),
            Self::Evict { object } => format!("evict {object}"),
            Self::Detach { object } => format!("detach {object}"),
            Self::Attach { object } => format!("attach {object}"),
            Self::Serialize { object } => format!("serialize {object}"),
        }
    }
}

// ─── Simulation ──────────────────────────────────────────────────────

/// A session plus the names the script uses for classes and objects.
#[derive(Debug)]
pub struct Simulation {
    config: PersistenceConfig,
    datastore: MemoryDatastore,
    session: Session,
    classes: BTreeMap<String, Arc<ClassMetaData>>,
    objects: BTreeMap<String, (ObjectId, Arc<ClassMetaData>)>,
}

/// Result of running a whole script.
#[derive(Debug, Default)]
pub struct Report {
    pub lines: Vec<String>,
    pub failures: usize,
}

impl Simulation {
    pub fn new(config: PersistenceConfig, classes: Vec<ClassMetaData>) -> Self {
        let datastore = MemoryDatastore::new();
        let session = Session::with_datastore(config.clone(), datastore.clone());
        Self {
            config,
            datastore,
            session,
            classes: classes
                .into_iter()
                .map(|c| (c.class_name.clone(), Arc::new(c)))
                .collect(),
            objects: BTreeMap::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The id bound to a script name.
    pub fn object_id(&self, name: &str) -> Option<&ObjectId> {
        self.objects.get(name).map(|(id, _)| id)
    }

    /// `name=STATE` for every named object.
    pub fn snapshot(&self) -> String {
        self.objects
            .iter()
            .map(|(name, (id, _))| match self.session.state_of(id) {
                Some(state) => format!("{name}={state}"),
                None => format!("{name}=?"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run every step, collecting output lines. Never stops early.
    pub fn run(&mut self, steps: &[Step]) -> Report {
        let mut report = Report::default();
        for (i, step) in steps.iter().enumerate() {
            let label = step.label();
            match self.run_step(step) {
                Ok(read) => {
                    report
                        .lines
                        .push(format!("{:>3}. {label:<36} {}", i + 1, self.snapshot()));
                    if let Some(value) = read {
                        report.lines.push(format!("     -> {value}"));
                    }
                }
                Err(e) => {
                    tracing::warn!(step = i + 1, "{e:#}");
                    report.failures += 1;
                    report
                        .lines
                        .push(format!("{:>3}. {label:<36} {}", i + 1, self.snapshot()));
                    report.lines.push(format!("     error: {e:#}"));
                }
            }
        }
        report
    }

    /// Run one step. Reads return the value read.
    pub fn run_step(&mut self, step: &Step) -> Result<Option<Value>> {
        match step {
            Step::Begin => self.session.begin()?,
            Step::Commit => self.session.commit()?,
            Step::Rollback => self.session.rollback()?,
            Step::Reopen => self.reopen()?,
            Step::Persist {
                object,
                class,
                values,
            } => {
                let class = self.class(class)?;
                self.ensure_unbound(object)?;
                let id = self.session.persist(Arc::clone(&class), values.clone())?;
                self.objects.insert(object.clone(), (id, class));
            }
            Step::Transient {
                object,
                class,
                values,
            } => {
                let class = self.class(class)?;
                self.ensure_unbound(object)?;
                let id = self.session.add_transient(Arc::clone(&class), values.clone())?;
                self.objects.insert(object.clone(), (id, class));
            }
            Step::Read { object, field } => {
                let (id, index) = self.field(object, field)?;
                return Ok(Some(self.session.read_field(&id, index)?));
            }
            Step::Write {
                object,
                field,
                value,
            } => {
                let (id, index) = self.field(object, field)?;
                self.session.write_field(&id, index, value.clone())?;
            }
            Step::Delete { object } => {
                let id = self.id(object)?;
                self.session.delete_persistent(&id)?;
            }
            Step::MakePersistent { object } => {
                let id = self.id(object)?;
                self.session.make_persistent(&id)?;
            }
            Step::MakeTransactional { object, refresh } => {
                let id = self.id(object)?;
                self.session.make_transactional(&id, *refresh)?;
            }
            Step::MakeNontransactional { object } => {
                let id = self.id(object)?;
                self.session.make_nontransactional(&id)?;
            }
            Step::MakeTransient {
                object,
                use_fetch_plan,
            } => {
                let id = self.id(object)?;
                self.session.make_transient(&id, *use_fetch_plan)?;
            }
            Step::Retrieve {
                object,
                fg_only,
                groups,
            } => {
                let id = self.id(object)?;
                match groups {
                    Some(groups) => {
                        let plan = FetchPlan::with_groups(groups.iter().cloned());
                        self.session.retrieve_fetch_plan(&id, &plan)?;
                    }
                    None => {
                        self.session.retrieve(&id, *fg_only)?;
                    }
                }
            }
            Step::Refresh { object } => {
                let id = self.id(object)?;
                self.session.refresh(&id)?;
            }
            Step::Evict { object } => {
                let id = self.id(object)?;
                self.session.evict(&id)?;
            }
            Step::Detach { object } => {
                let id = self.id(object)?;
                self.session.detach(&id)?;
            }
            Step::Attach { object } => {
                let id = self.id(object)?;
                self.session.attach(&id)?;
            }
            Step::Serialize { object } => {
                let id = self.id(object)?;
                self.session.serialize(&id)?;
            }
        }
        Ok(None)
    }

    fn reopen(&mut self) -> Result<()> {
        if self.session.is_active() {
            bail!("cannot reopen while a transaction is active");
        }
        let mut session = Session::with_datastore(self.config.clone(), self.datastore.clone());
        self.objects
            .retain(|_, (id, class)| session.find(Arc::clone(class), id).is_ok());
        self.session = session;
        Ok(())
    }

    fn class(&self, name: &str) -> Result<Arc<ClassMetaData>> {
        self.classes
            .get(name)
            .cloned()
            .with_context(|| format!("unknown class {name}"))
    }

    fn ensure_unbound(&self, object: &str) -> Result<()> {
        if self.objects.contains_key(object) {
            bail!("object name {object} is already bound");
        }
        Ok(())
    }

    fn id(&self, object: &str) -> Result<ObjectId> {
        self.object_id(object)
            .cloned()
            .with_context(|| format!("unknown object {object}"))
    }

    fn field(&self, object: &str, field: &str) -> Result<(ObjectId, usize)> {
        let (id, class) = self
            .objects
            .get(object)
            .with_context(|| format!("unknown object {object}"))?;
        let index = class
            .field_index(field)
            .with_context(|| format!("class {} has no field {field}", class.class_name))?;
        Ok((id.clone(), index))
    }
}

/// Execute the simulate subcommand.
pub fn run_simulate(args: &SimulateArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = crate::load_config(config_path)?;
    let script = Script::from_path(&args.script)?;
    tracing::info!(
        steps = script.steps.len(),
        classes = script.classes.len(),
        "running simulation"
    );

    let mut simulation = Simulation::new(config, script.classes);
    let report = simulation.run(&script.steps);
    for line in &report.lines {
        println!("{line}");
    }
    println!(
        "{} steps, {} failed",
        script.steps.len(),
        report.failures
    );

    if args.strict && report.failures > 0 {
        return Ok(1);
    }
    Ok(0)
}
