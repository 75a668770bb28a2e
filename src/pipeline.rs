//! Named analyses read from a TOML file: where the data comes from, how it is shaped and
//! grouped, and what chart it ends up as.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    group_mean, load_singular_values, load_table, write_csv, Chart, Error, Field, Figure,
    LabelMap, Output, Result, Schema, Table, Value,
};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "layout", rename_all = "kebab-case")]
pub enum Source {
    /// One observation per row, columns as listed.
    Columns {
        path: PathBuf,
        #[serde(default)]
        has_header: bool,
        columns: Vec<Field>,
        labels: Option<LabelMap>,
    },
    /// `Nr, Nt, λ1, λ2, ...` rows.
    SingularValues { path: PathBuf },
}

impl Source {
    pub fn load(&self, base: &Path) -> Result<Table> {
        match self {
            Source::Columns {
                path,
                has_header,
                columns,
                labels,
            } => {
                let schema = Schema::new(columns.clone()).with_header(*has_header);
                load_table(resolve(base, path), &schema, labels.as_ref())
            }
            Source::SingularValues { path } => load_singular_values(resolve(base, path)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub column: String,
    pub equals: Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveCapacity {
    pub snr: String,
    #[serde(default = "DeriveCapacity::default_into")]
    pub into: String,
}

impl DeriveCapacity {
    fn default_into() -> String {
        String::from("cap")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveLabel {
    pub into: String,
    pub template: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aggregate {
    pub keys: Vec<String>,
    pub measure: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pipeline {
    pub name: String,
    pub source: Source,
    pub head: Option<usize>,
    pub step: Option<usize>,
    #[serde(default)]
    pub filter: Vec<Filter>,
    pub derive_capacity: Option<DeriveCapacity>,
    #[serde(default)]
    pub derive_label: Vec<DeriveLabel>,
    pub aggregate: Option<Aggregate>,
    pub chart: Chart,
    /// Absent means an interactive window.
    pub output: Option<PathBuf>,
    /// Also write the final table as CSV.
    pub export: Option<PathBuf>,
}

/// A pipeline with its data loaded and its figure laid out, ready to render.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub table: Table,
    pub figure: Figure,
    pub output: Output,
    pub export: Option<PathBuf>,
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
        }
        _ => Ok(()),
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl Pipeline {
    /// Load, shape and aggregate. Relative paths are taken from `base`.
    pub fn table(&self, base: &Path) -> Result<Table> {
        let mut table = self.source.load(base)?;

        if let Some(n) = self.head {
            table = table.head(n);
        }
        if let Some(n) = self.step {
            table = table.step_by(n)?;
        }
        for filter in self.filter.iter() {
            table = table.filter_eq(&filter.column, &filter.equals)?;
        }
        if let Some(derive) = &self.derive_capacity {
            table = table.with_capacity(&derive.snr, &derive.into)?;
        }
        for derive in self.derive_label.iter() {
            table = table.with_label(&derive.into, &derive.template)?;
        }
        debug!(pipeline = %self.name, rows = table.len(), "shaped");

        if let Some(aggregate) = &self.aggregate {
            let keys: Vec<&str> = aggregate.keys.iter().map(String::as_str).collect();
            table = group_mean(&table, &keys, &aggregate.measure)?;
        }
        Ok(table)
    }

    pub fn prepare(&self, base: &Path) -> Result<Prepared> {
        let table = self.table(base)?;
        let figure = Figure::build(&self.chart, &table)?;
        let output = match &self.output {
            Some(path) => Output::file(resolve(base, path)),
            None => Output::Display,
        };
        Ok(Prepared {
            table,
            figure,
            output,
            export: self.export.as_ref().map(|p| resolve(base, p)),
        })
    }

    pub fn run(&self, base: &Path) -> Result<()> {
        info!(pipeline = %self.name, "running");
        let prepared = self.prepare(base)?;
        if let Some(path) = &prepared.export {
            ensure_parent(path)?;
            write_csv(&prepared.table, path)?;
            info!(pipeline = %self.name, path = %path.display(), "exported table");
        }
        if let Output::File(path) = &prepared.output {
            ensure_parent(path)?;
        }
        prepared.figure.render(&prepared.output)
    }
}

/// Every pipeline in one analysis file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Analysis {
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<Pipeline>,
    /// Directory that relative paths are resolved against.
    #[serde(skip)]
    pub base: PathBuf,
}

impl Analysis {
    pub fn from_toml(contents: &str, base: &Path) -> Result<Analysis> {
        let mut analysis: Analysis =
            toml::from_str(contents).map_err(|err| Error::Config(err.to_string()))?;
        analysis.base = base.to_path_buf();

        let mut seen = HashSet::new();
        for pipeline in analysis.pipelines.iter() {
            if !seen.insert(pipeline.name.as_str()) {
                return Err(Error::Config(format!(
                    "pipeline `{}` is defined twice",
                    pipeline.name
                )));
            }
        }
        Ok(analysis)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Analysis> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let analysis = Analysis::from_toml(&contents, base)?;
        info!(
            path = %path.display(),
            pipelines = analysis.pipelines.len(),
            "loaded analysis"
        );
        Ok(analysis)
    }

    /// The named pipelines in file order, or all of them when `only` is empty.
    pub fn select(&self, only: &[String]) -> Result<Vec<&Pipeline>> {
        if let Some(unknown) = only
            .iter()
            .find(|name| !self.pipelines.iter().any(|p| &p.name == *name))
        {
            return Err(Error::Config(format!("no pipeline named `{unknown}`")));
        }
        Ok(self
            .pipelines
            .iter()
            .filter(|p| only.is_empty() || only.contains(&p.name))
            .collect())
    }
}
