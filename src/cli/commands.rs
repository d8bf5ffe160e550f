//! Command handlers
//!
//! Each handler loads settings, builds a [`ServiceContainer`] and drives the
//! application services. Errors propagate as [`CliError`] so `main` can map
//! them to exit codes.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::OutputTree;
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{BackendTag, CompareMode, DifferenceKind, Grid, ParamError, ParameterTree};
use crate::infrastructure::ServiceContainer;

/// Top-level key selecting the backend when `--backend` is absent.
pub const BACKEND_KEY: &str = "backend";

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Construct {
            ini,
            backend,
            output,
            snapshot,
        }) => cmd_construct(ini, backend.as_deref(), output.as_deref(), snapshot.as_deref()),
        Some(Commands::Compare {
            actual,
            reference,
            fuzzy,
            relative,
            absolute,
            exclude,
        }) => cmd_compare(actual, reference, *fuzzy, *relative, *absolute, exclude),
        Some(Commands::Show { ini }) => cmd_show(ini),
        Some(Commands::Backends) => cmd_backends(),
        Some(Commands::Config { command }) => cmd_config(command),
        Some(Commands::Completion { shell }) => cmd_completion(*shell),
        None => Err(CliError::Usage(
            "no command given, see 'inigrid --help'".to_string(),
        )),
    }
}

/// Container with settings layered for the directory holding `path`.
fn container_for(path: Option<&Path>) -> CliResult<ServiceContainer> {
    let dir = path.and_then(Path::parent);
    let settings = Settings::load(dir)?;
    Ok(ServiceContainer::new(settings))
}

/// `--backend`, then the parameter file's `backend` key, then the configured default.
fn select_backend(
    flag: Option<&str>,
    params: &ParameterTree,
    settings: &Settings,
) -> CliResult<BackendTag> {
    if let Some(flag) = flag {
        return flag
            .parse()
            .map_err(|e| CliError::InvalidArgs(format!("--backend: {}", e)));
    }
    if params.has_key(BACKEND_KEY) {
        let value = params.get_str(BACKEND_KEY).map_err(ApplicationError::from)?;
        return value.parse().map_err(|_| {
            ApplicationError::from(ParamError::InvalidValue {
                key: BACKEND_KEY.to_string(),
                value: value.to_string(),
                expected: "<kind>:<dim>".to_string(),
            })
            .into()
        });
    }
    settings.default_backend_tag()?.ok_or_else(|| {
        CliError::Usage(
            "no backend selected: pass --backend or set 'backend' in the parameter file"
                .to_string(),
        )
    })
}

#[instrument]
fn cmd_construct(
    ini: &Path,
    backend: Option<&str>,
    output_path: Option<&Path>,
    snapshot: Option<&Path>,
) -> CliResult<()> {
    let container = container_for(Some(ini))?;
    let params = container.parameters().load(ini)?;
    let tag = select_backend(backend, &params, &container.settings)?;
    debug!("cmd_construct: backend={}", tag);

    let construction = container
        .factory
        .construct_detailed(&params, tag)
        .map_err(ApplicationError::from)?;
    let grid = construction.grid.as_ref();

    if let Some(path) = snapshot {
        let structured = grid.as_structured().ok_or_else(|| {
            CliError::Usage(format!("{} grids cannot be written as snapshots", tag))
        })?;
        container.factory.backup(structured, path)?;
        output::action("Snapshot", &path.display());
    }

    let destination: PathBuf = match output_path {
        Some(path) => path.to_path_buf(),
        None => {
            let extension = container.settings.output_extension.as_str();
            OutputTree::destination_for(&params, Some(extension))
                .map_err(ApplicationError::from)?
        }
    };
    OutputTree::scoped(container.fs.clone(), destination.clone(), |tree| {
        record_grid(tree, grid, construction.strategy.name())
    })?;
    debug!("cmd_construct: recorded to {}", destination.display());

    output::success(&format!(
        "Created {} with {} cells.",
        tag,
        grid.cell_count()
    ));
    Ok(())
}

fn record_grid(
    tree: &mut OutputTree,
    grid: &dyn Grid,
    strategy: &str,
) -> Result<(), ApplicationError> {
    tree.push_prefix("grid")?;
    tree.set("backend", grid.backend())?;
    tree.set("strategy", strategy)?;
    tree.set("dimension", grid.dimension())?;
    tree.set("cells", grid.cell_count())?;
    tree.set("vertices", grid.vertex_count())?;
    tree.set("refinement", grid.refinement_level())?;
    tree.pop_prefix()?;
    Ok(())
}

#[instrument]
fn cmd_compare(
    actual: &Path,
    reference: &Path,
    fuzzy: bool,
    relative: Option<f64>,
    absolute: Option<f64>,
    exclude: &[String],
) -> CliResult<()> {
    let container = container_for(Some(reference))?;
    let mode = if fuzzy {
        CompareMode::Fuzzy
    } else {
        CompareMode::Exact
    };
    let mut options = container.settings.compare.options(mode);
    if let Some(relative) = relative {
        options.relative = relative;
    }
    if let Some(absolute) = absolute {
        options.absolute = absolute;
    }
    options.exclude = exclude.to_vec();

    let report = container
        .comparison()
        .compare(actual, reference, &options)?;
    if report.is_match() {
        output::success(&format!(
            "Output trees match ({} key(s) compared)",
            report.compared
        ));
        return Ok(());
    }

    output::header(&format!(
        "{} differs from {}",
        actual.display(),
        reference.display()
    ));
    for difference in &report.differences {
        match &difference.kind {
            DifferenceKind::MissingInActual => output::diff_remove(difference),
            DifferenceKind::MissingInReference => output::diff_add(difference),
            DifferenceKind::ValueMismatch { .. } => output::failure(difference),
        }
    }
    Err(ApplicationError::Mismatch {
        count: report.differences.len(),
    }
    .into())
}

#[instrument]
fn cmd_show(ini: &Path) -> CliResult<()> {
    let container = container_for(Some(ini))?;
    let params = container.parameters().load(ini)?;
    output::info(&parameter_tree(ini.display().to_string(), &params));
    Ok(())
}

fn parameter_tree(label: String, params: &ParameterTree) -> Tree<String> {
    let leaves = params
        .entries()
        .map(|(key, value)| Tree::new(format!("{} = {}", key, value)));
    let groups = params
        .groups()
        .map(|(name, sub)| parameter_tree(format!("[{}]", name), sub));
    Tree::new(label).with_leaves(leaves.chain(groups))
}

#[instrument]
fn cmd_backends() -> CliResult<()> {
    let container = container_for(None)?;
    for tag in container.factory.backends() {
        output::detail(&format!("{:<14} {}", tag.to_string(), tag.kind.display_name()));
    }
    Ok(())
}

#[instrument]
fn cmd_config(command: &ConfigCommands) -> CliResult<()> {
    let cwd = std::env::current_dir().map_err(|e| {
        crate::infrastructure::InfraError::io("determine current directory", e)
    })?;
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(&cwd))?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("Global", &path.display()),
                None => output::warning("no home directory, global config disabled"),
            }
            output::action("Local", &local_config_path(&cwd).display());
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

fn cmd_completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
