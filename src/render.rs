//! Charts drawn by matplotlib through the embedded interpreter.
//!
//! Building a [`Figure`] only validates the chart against the table and writes down the data
//! bindings and the statements to run; nothing touches Python until [`Figure::render`].

use std::ffi::CString;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use pyo3::prelude::*;
use pyo3::types::IntoPyDict;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{aggregate::partition, Error, Result, Table, Value};

/// Markers handed out to hue groups in turn.
pub const MARKERS: [&str; 10] = ["p", "d", "s", "o", "+", "v", "x", "h", "<", ">"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    Box,
    #[default]
    Line,
    Scatter,
    Histogram,
}

/// A second y-axis sharing the chart's x-axis.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryAxis {
    pub column: String,
    pub label: Option<String>,
    pub color: Option<String>,
}

impl SecondaryAxis {
    pub fn new(column: &str) -> SecondaryAxis {
        SecondaryAxis {
            column: column.to_string(),
            label: None,
            color: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chart {
    #[serde(default)]
    pub kind: ChartKind,
    /// Category column for box plots, value column for histograms.
    pub x: String,
    pub y: Option<String>,
    pub hue: Option<String>,
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub legend_title: Option<String>,
    #[serde(default)]
    pub log_y: bool,
    pub y_range: Option<[f64; 2]>,
    /// Box plot categories, left to right.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub tick_labels: Vec<String>,
    pub secondary: Option<SecondaryAxis>,
    pub color: Option<String>,
    pub bins: Option<usize>,
    #[serde(default = "Chart::default_size")]
    pub size: [f64; 2],
    #[serde(default = "Chart::default_grid")]
    pub grid: bool,
}

impl Chart {
    fn default_size() -> [f64; 2] {
        [10.0, 6.0]
    }
    fn default_grid() -> bool {
        true
    }

    pub fn new(kind: ChartKind, x: &str, y: Option<&str>) -> Chart {
        Chart {
            kind,
            x: x.to_string(),
            y: y.map(str::to_string),
            hue: None,
            title: None,
            x_label: None,
            y_label: None,
            legend_title: None,
            log_y: false,
            y_range: None,
            order: vec![],
            tick_labels: vec![],
            secondary: None,
            color: None,
            bins: None,
            size: Chart::default_size(),
            grid: Chart::default_grid(),
        }
    }

    pub fn line(x: &str, y: &str) -> Chart {
        Chart::new(ChartKind::Line, x, Some(y))
    }

    pub fn scatter(x: &str, y: &str) -> Chart {
        Chart::new(ChartKind::Scatter, x, Some(y))
    }

    pub fn box_plot(x: &str, y: &str) -> Chart {
        Chart::new(ChartKind::Box, x, Some(y))
    }

    pub fn histogram(x: &str) -> Chart {
        Chart::new(ChartKind::Histogram, x, None)
    }

    pub fn hue(mut self, column: &str) -> Chart {
        self.hue = Some(column.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Chart {
        self.title = Some(title.to_string());
        self
    }

    pub fn labels(mut self, x: &str, y: &str) -> Chart {
        self.x_label = Some(x.to_string());
        self.y_label = Some(y.to_string());
        self
    }

    pub fn log_y(mut self) -> Chart {
        self.log_y = true;
        self
    }

    pub fn y_range(mut self, low: f64, high: f64) -> Chart {
        self.y_range = Some([low, high]);
        self
    }

    pub fn secondary(mut self, axis: SecondaryAxis) -> Chart {
        self.secondary = Some(axis);
        self
    }
}

/// Where a rendered figure goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    Display,
    File(PathBuf),
}

impl Output {
    /// A file output; paths without an extension are written as EPS.
    pub fn file(path: impl AsRef<Path>) -> Output {
        let path = path.as_ref();
        if path.extension().is_some() {
            Output::File(path.to_path_buf())
        } else {
            Output::File(path.with_extension("eps"))
        }
    }

    fn format(path: &Path) -> String {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| String::from("eps"))
    }
}

/// Data handed to the interpreter under a variable name.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Floats(Vec<f64>),
    Labels(Vec<String>),
    Groups(Vec<Vec<f64>>),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Figure {
    bindings: Vec<(String, Binding)>,
    statements: Vec<String>,
}

enum Legend {
    None,
    Labels,
    /// Python expressions for the handle and label lists.
    Handles(String, String),
}

impl Legend {
    fn labelled(any: bool) -> Legend {
        if any { Legend::Labels } else { Legend::None }
    }
}

/// One line of a line/scatter chart.
struct Series {
    label: Option<String>,
    x: Vec<f64>,
    y: Vec<f64>,
    secondary: Vec<f64>,
}

fn render_error(message: String) -> Error {
    Error::Render(message)
}

fn numeric(table: &Table, column: &str, role: &str) -> Result<Vec<f64>> {
    if !table.has_column(column) {
        return Err(render_error(format!("{role} column `{column}` is not in the table")));
    }
    table
        .numeric_column(column)
        .map_err(|err| render_error(format!("{role} column must be numeric: {err}")))
}

fn label_of(value: &Value) -> String {
    match value {
        Value::Missing => String::from("missing"),
        other => other.to_string(),
    }
}

fn finite(x: f64) -> Result<String> {
    if x.is_finite() {
        Ok(format!("{x:?}"))
    } else {
        Err(render_error(format!("{x} is not a finite number")))
    }
}

impl Figure {
    fn bind(&mut self, name: impl Into<String>, binding: Binding) -> String {
        let name = name.into();
        self.bindings.push((name.clone(), binding));
        name
    }

    fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn bindings(&self) -> &[(String, Binding)] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Check `chart` against `table` and lay out everything needed to draw it.
    pub fn build(chart: &Chart, table: &Table) -> Result<Figure> {
        if let Some(hue) = &chart.hue {
            if !table.has_column(hue) {
                return Err(render_error(format!(
                    "hue `{hue}` requested but the table has no such column"
                )));
            }
        }
        if chart.secondary.is_some()
            && matches!(chart.kind, ChartKind::Box | ChartKind::Histogram)
        {
            return Err(render_error(format!(
                "a secondary axis needs a line or scatter chart, not {:?}",
                chart.kind
            )));
        }
        if let Some([low, high]) = chart.y_range {
            if !(low < high) {
                return Err(render_error(format!("empty y range [{low}, {high}]")));
            }
            if chart.log_y && low <= 0f64 {
                return Err(render_error(format!(
                    "log scale needs a positive lower bound, got {low}"
                )));
            }
        }
        if !chart.tick_labels.is_empty() && chart.kind != ChartKind::Box {
            return Err(render_error(String::from(
                "tick labels only apply to box plots",
            )));
        }

        let mut fig = Figure::default();
        let [width, height] = chart.size;
        fig.push(format!(
            "fig, axes = plt.subplots(1, figsize=({}, {}))",
            finite(width)?,
            finite(height)?
        ));

        let legend = match chart.kind {
            ChartKind::Line | ChartKind::Scatter => fig.xy(chart, table)?,
            ChartKind::Box => fig.boxes(chart, table)?,
            ChartKind::Histogram => fig.histogram(chart, table)?,
        };
        fig.decorate(chart, legend)?;

        debug!(
            kind = ?chart.kind,
            bindings = fig.bindings.len(),
            statements = fig.statements.len(),
            "built figure"
        );
        Ok(fig)
    }

    fn y_column(chart: &Chart) -> Result<&str> {
        chart.y.as_deref().ok_or_else(|| {
            render_error(format!("a {:?} chart needs a `y` column", chart.kind))
        })
    }

    fn series(chart: &Chart, table: &Table) -> Result<Vec<Series>> {
        let y = Figure::y_column(chart)?;
        let one = |label: Option<String>, t: &Table| -> Result<Series> {
            Ok(Series {
                label,
                x: numeric(t, &chart.x, "x")?,
                y: numeric(t, y, "y")?,
                secondary: match &chart.secondary {
                    Some(axis) => numeric(t, &axis.column, "secondary")?,
                    None => vec![],
                },
            })
        };

        // Validate against the whole table so an empty one still reports bad columns.
        let whole = one(None, table)?;
        match &chart.hue {
            None => Ok(vec![whole]),
            Some(hue) => partition(table, hue)?
                .into_iter()
                .map(|(value, part)| one(Some(label_of(&value)), &part))
                .collect(),
        }
    }

    fn xy(&mut self, chart: &Chart, table: &Table) -> Result<Legend> {
        let mut series = Figure::series(chart, table)?;

        if chart.log_y {
            let non_positive = series
                .iter()
                .flat_map(|s| s.y.iter())
                .filter(|&&y| y <= 0f64)
                .count();
            if non_positive > 0 {
                warn!(non_positive, "values at or below zero are not drawn on a log axis");
            }
        }

        let primary_color = match (&chart.color, &chart.secondary) {
            (Some(color), _) => Some(color.clone()),
            (None, Some(_)) => Some(String::from("purple")),
            (None, None) => None,
        };
        let primary_color = primary_color.map(|c| self.bind("primary_color", Binding::Text(c)));
        let marked = chart.secondary.is_some() && chart.hue.is_some();
        if marked {
            self.bind(
                "markers",
                Binding::Labels(MARKERS.iter().map(|m| m.to_string()).collect()),
            );
        }

        for (i, s) in series.iter_mut().enumerate() {
            if chart.kind == ChartKind::Line {
                // Lines are drawn left to right.
                let order: Vec<usize> = (0..s.x.len())
                    .sorted_by(|&a, &b| s.x[a].total_cmp(&s.x[b]))
                    .collect();
                s.x = order.iter().map(|&j| s.x[j]).collect();
                s.y = order.iter().map(|&j| s.y[j]).collect();
                if !s.secondary.is_empty() {
                    s.secondary = order.iter().map(|&j| s.secondary[j]).collect();
                }
            }

            let x = self.bind(format!("x_{i}"), Binding::Floats(s.x.clone()));
            let y = self.bind(format!("y_{i}"), Binding::Floats(s.y.clone()));
            let mut args = vec![x, y];
            if let Some(label) = &s.label {
                args.push(format!(
                    "label={}",
                    self.bind(format!("label_{i}"), Binding::Text(label.clone()))
                ));
            }
            if let Some(color) = &primary_color {
                args.push(format!("color={color}"));
            }
            if marked {
                args.push(format!("marker=markers[{}]", i % MARKERS.len()));
            }

            match chart.kind {
                ChartKind::Line => {
                    args.push(String::from("linewidth=2.5"));
                    self.push(format!("axes.plot({})", args.join(", ")));
                }
                _ => {
                    args.push(String::from("s=60"));
                    self.push(format!("axes.scatter({})", args.join(", ")));
                }
            }
        }

        if let Some(axis) = &chart.secondary {
            let color = self.bind(
                "secondary_color",
                Binding::Text(axis.color.clone().unwrap_or_else(|| String::from("green"))),
            );
            let label = self.bind(
                "secondary_label",
                Binding::Text(axis.label.clone().unwrap_or_else(|| axis.column.clone())),
            );
            self.push("axes2 = axes.twinx()");
            for (i, s) in series.iter().enumerate() {
                let values = self.bind(format!("s_{i}"), Binding::Floats(s.secondary.clone()));
                let mut args = vec![format!("x_{i}"), values, format!("color={color}")];
                if marked {
                    args.push(format!("marker=markers[{}]", i % MARKERS.len()));
                }
                match chart.kind {
                    ChartKind::Line => {
                        args.push(String::from("linewidth=2.5"));
                        args.push(String::from("linestyle='--'"));
                        self.push(format!("axes2.plot({})", args.join(", ")));
                    }
                    _ => {
                        args.push(String::from("s=60"));
                        self.push(format!("axes2.scatter({})", args.join(", ")));
                    }
                }
            }
            self.push(format!("axes2.set_ylabel({label}, fontsize=13, color={color})"));
        }

        Ok(Legend::labelled(series.iter().any(|s| s.label.is_some())))
    }

    fn boxes(&mut self, chart: &Chart, table: &Table) -> Result<Legend> {
        let y = Figure::y_column(chart)?;
        if !table.has_column(&chart.x) {
            return Err(render_error(format!(
                "x column `{}` is not in the table",
                chart.x
            )));
        }
        numeric(table, y, "y")?;

        let categories: Vec<String> = if chart.order.is_empty() {
            table.column(&chart.x)?.map(label_of).unique().collect()
        } else {
            chart.order.clone()
        };
        let ticks: Vec<String> = if chart.tick_labels.is_empty() {
            categories.clone()
        } else if chart.tick_labels.len() == categories.len() {
            chart.tick_labels.clone()
        } else {
            return Err(render_error(format!(
                "{} tick labels for {} categories",
                chart.tick_labels.len(),
                categories.len()
            )));
        };

        let hues: Vec<(Option<String>, Table)> = match &chart.hue {
            None => vec![(None, table.clone())],
            Some(hue) => partition(table, hue)?
                .into_iter()
                .map(|(value, part)| (Some(label_of(&value)), part))
                .collect(),
        };

        let width = 0.8 / hues.len().max(1) as f64;
        let mut handles = vec![];
        for (j, (label, part)) in hues.iter().enumerate() {
            let x = part.column(&chart.x)?.map(label_of).collect::<Vec<String>>();
            let values = numeric(part, y, "y")?;
            let groups: Vec<Vec<f64>> = categories
                .iter()
                .map(|c| {
                    x.iter()
                        .zip(values.iter())
                        .filter(|(x_i, _)| *x_i == c)
                        .map(|(_, &v)| v)
                        .collect()
                })
                .collect();
            let offset = (j as f64 - (hues.len() as f64 - 1f64) / 2f64) * width;
            let positions: Vec<f64> = (0..categories.len())
                .map(|k| (k + 1) as f64 + offset)
                .collect();

            let groups = self.bind(format!("groups_{j}"), Binding::Groups(groups));
            let positions = self.bind(format!("positions_{j}"), Binding::Floats(positions));
            let face = match (&chart.color, label) {
                (Some(color), None) => self.bind("primary_color", Binding::Text(color.clone())),
                _ => format!("'C{}'", j % 10),
            };
            self.push(format!(
                "box_{j} = axes.boxplot({groups}, positions={positions}, widths={}, patch_artist=True, boxprops=dict(facecolor={face}))",
                finite(width * 0.9)?
            ));
            if let Some(label) = label {
                let name = self.bind(format!("label_{j}"), Binding::Text(label.clone()));
                handles.push((format!("box_{j}['boxes'][0]"), name));
            }
        }

        let ticks_at = self.bind(
            "ticks",
            Binding::Floats((1..=categories.len()).map(|k| k as f64).collect()),
        );
        let tick_labels = self.bind("tick_labels", Binding::Labels(ticks));
        self.push(format!("axes.set_xticks({ticks_at})"));
        self.push(format!("axes.set_xticklabels({tick_labels})"));

        if handles.is_empty() {
            Ok(Legend::None)
        } else {
            // Boxplot artists carry no label, so the legend gets explicit handles.
            Ok(Legend::Handles(
                format!("[{}]", handles.iter().map(|(h, _)| h).join(", ")),
                format!("[{}]", handles.iter().map(|(_, l)| l).join(", ")),
            ))
        }
    }

    fn histogram(&mut self, chart: &Chart, table: &Table) -> Result<Legend> {
        numeric(table, &chart.x, "x")?;
        let parts: Vec<(Option<String>, Vec<f64>)> = match &chart.hue {
            None => vec![(None, numeric(table, &chart.x, "x")?)],
            Some(hue) => partition(table, hue)?
                .into_iter()
                .map(|(value, part)| -> Result<(Option<String>, Vec<f64>)> {
                    Ok((Some(label_of(&value)), numeric(&part, &chart.x, "x")?))
                })
                .collect::<Result<_>>()?,
        };

        let bins = match chart.bins {
            Some(0) => return Err(render_error(String::from("a histogram needs at least one bin"))),
            Some(n) => n.to_string(),
            None => String::from("'auto'"),
        };
        let alpha = if parts.len() > 1 { "0.6" } else { "1.0" };
        let legend = Legend::labelled(parts.iter().any(|(label, _)| label.is_some()));

        for (i, (label, values)) in parts.into_iter().enumerate() {
            let values = self.bind(format!("values_{i}"), Binding::Floats(values));
            let mut args = vec![values, format!("bins={bins}"), format!("alpha={alpha}")];
            if let Some(label) = label {
                args.push(format!(
                    "label={}",
                    self.bind(format!("label_{i}"), Binding::Text(label))
                ));
            }
            if let Some(color) = &chart.color {
                if chart.hue.is_none() {
                    args.push(format!(
                        "color={}",
                        self.bind("primary_color", Binding::Text(color.clone()))
                    ));
                }
            }
            self.push(format!("axes.hist({})", args.join(", ")));
        }
        Ok(legend)
    }

    fn decorate(&mut self, chart: &Chart, legend: Legend) -> Result<()> {
        let x_label = chart.x_label.clone().unwrap_or_else(|| chart.x.clone());
        let y_label = match (&chart.y_label, &chart.y, chart.kind) {
            (Some(label), _, _) => label.clone(),
            (None, _, ChartKind::Histogram) => String::from("Count"),
            (None, Some(y), _) => y.clone(),
            (None, None, _) => String::new(),
        };
        let x_label = self.bind("x_label", Binding::Text(x_label));
        let y_label = self.bind("y_label", Binding::Text(y_label));
        self.push(format!("axes.set_xlabel({x_label}, fontsize=13)"));
        match (&chart.secondary, self.binding("primary_color").is_some()) {
            (Some(_), true) => self.push(format!(
                "axes.set_ylabel({y_label}, fontsize=13, color=primary_color)"
            )),
            _ => self.push(format!("axes.set_ylabel({y_label}, fontsize=13)")),
        }

        if let Some(title) = &chart.title {
            let title = self.bind("title", Binding::Text(title.clone()));
            self.push(format!("axes.set_title({title}, fontsize=16)"));
        }
        if chart.log_y {
            self.push("axes.set_yscale('log')");
        }
        if let Some([low, high]) = chart.y_range {
            self.push(format!("axes.set_ylim({}, {})", finite(low)?, finite(high)?));
        }
        if chart.grid {
            self.push("axes.grid(True, which='both')");
        }

        let legend_title = chart
            .legend_title
            .clone()
            .map(|t| self.bind("legend_title", Binding::Text(t)));
        let title_arg = legend_title
            .map(|t| format!(", title={t}"))
            .unwrap_or_default();
        match legend {
            Legend::None => {}
            Legend::Labels => self.push(format!("axes.legend(loc='best'{title_arg})")),
            Legend::Handles(handles, labels) => {
                self.push(format!("axes.legend({handles}, {labels}{title_arg})"))
            }
        }
        Ok(())
    }

    /// Draw the figure. Blocks until the window closes or the file is written.
    pub fn render(&self, output: &Output) -> Result<()> {
        Python::with_gil(|py| -> Result<()> {
            let matplotlib = py.import("matplotlib")?;
            let plt = py.import("matplotlib.pyplot")?;
            let scope = [("matplotlib", matplotlib), ("plt", plt)].into_py_dict(py)?;

            let mut statements: Vec<String> = vec![];
            match output {
                Output::Display => {}
                Output::File(path) => {
                    scope.set_item("output_path", path.to_string_lossy().to_string())?;
                    scope.set_item("output_format", Output::format(path))?;
                    statements.push(String::from("plt.switch_backend('agg')"));
                }
            }

            for (name, binding) in self.bindings.iter() {
                match binding {
                    Binding::Floats(values) => scope.set_item(name, values)?,
                    Binding::Labels(labels) => scope.set_item(name, labels)?,
                    Binding::Groups(groups) => scope.set_item(name, groups)?,
                    Binding::Text(text) => scope.set_item(name, text)?,
                }
            }

            statements.extend(self.statements.iter().cloned());
            match output {
                Output::Display => statements.push(String::from("plt.show()")),
                Output::File(_) => statements.push(String::from(
                    "fig.savefig(output_path, format=output_format, bbox_inches='tight')",
                )),
            }
            statements.push(String::from("plt.close('all')"));

            for line in statements.iter() {
                py.run(&CString::new(line.as_str())?, Some(&scope), None)?;
            }
            Ok(())
        })?;

        match output {
            Output::Display => info!("figure closed"),
            Output::File(path) => info!(path = %path.display(), "figure saved"),
        }
        Ok(())
    }
}
