use anyhow::{Context, Result, bail};
use andare::issues::{ErrorReport, ReportLinks, issue_title};
use andare::{
    ChangeKind, Command, Config, ContentTree, DiffEntry, DocumentPath, DocumentSource,
    MarkdownRenderer, RefSource, WorktreeSource, page,
};
use log::{LevelFilter, error, info};
use std::fs;
use std::io;
use std::path::Path;

fn main() -> Result<()> {
    let config = Config::parse();

    env_logger::Builder::new()
        .filter_level(match config.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    config.validate().context("Invalid configuration")?;

    let renderer =
        MarkdownRenderer::new(config.render_config()).context("Failed to create renderer")?;

    match &config.command {
        Command::Render {
            path,
            reference,
            worktree,
        } => {
            let path: DocumentPath = path.parse()?;
            let source: Box<dyn DocumentSource> = if *worktree {
                Box::new(WorktreeSource::new(&config.repo))
            } else {
                Box::new(RefSource::new(&config.repo, reference.as_str()))
            };
            let page = andare::render_document(source.as_ref(), &path, &renderer)?;
            println!(
                "{}",
                serde_json::to_string(&page).context("Failed to serialize page")?
            );
        }
        Command::View {
            path,
            reference,
            output,
            open: open_page,
            edit_base,
        } => {
            let path: DocumentPath = path.parse()?;
            let source = RefSource::new(&config.repo, reference.as_str());
            let rendered = andare::render_document(&source, &path, &renderer)?;
            let html = page::document_page(&rendered, &page::edit_url(edit_base, &path));

            match output {
                Some(file) => {
                    write_page(file, &html.into_string())?;
                    if *open_page {
                        open::that(file)
                            .with_context(|| format!("Failed to open {}", file.display()))?;
                    }
                }
                None => println!("{}", html.into_string()),
            }
        }
        Command::Contents {
            local,
            remote,
            name_status,
        } => {
            let entries = match name_status {
                Some(file) => DiffEntry::parse_name_status(&read_input(file)?)
                    .context("Failed to parse name-status listing")?,
                None => andare::diff_refs(&config.repo, local, remote)
                    .context("Failed to compare references")?,
            };
            print_tree(&entries, &config.extension)?;
        }
        Command::AllContents { reference } => {
            let entries = andare::all_entries(&config.repo, reference)
                .context("Failed to list documents")?;
            print_tree(&entries, &config.extension)?;
        }
        Command::Check {
            local,
            remote,
            repo_url,
            check_url,
            next_run,
        } => {
            let entries = andare::diff_refs(&config.repo, local, remote)
                .context("Failed to compare references")?;
            let tree = ContentTree::from_entries(&entries, &config.extension);
            let failures = check_documents(&config.repo, remote, &tree, &renderer);

            if failures.is_empty() {
                info!("All changed documents rendered");
                return Ok(());
            }

            let report = ErrorReport {
                commit_id: andare::commit_id(&config.repo, local)?,
                failures,
                next_run: next_run.clone(),
            };
            let links = ReportLinks {
                repo_url: repo_url.clone(),
                branch: local.clone(),
                check_url: check_url.clone(),
            };
            error!("{}", issue_title(&report.commit_id));
            println!("{}", report.new_issue_body(&links));
            bail!("{} document(s) failed to render", report.failures.len());
        }
    }

    Ok(())
}

/// Renders every appended or updated document at `reference`.
///
/// Returns the paths that failed.
fn check_documents(
    repo: &Path,
    reference: &str,
    tree: &ContentTree,
    renderer: &MarkdownRenderer,
) -> Vec<String> {
    let source = RefSource::new(repo, reference);
    let mut failures = Vec::new();

    for (path, kind) in tree.paths() {
        if kind == ChangeKind::Delete {
            continue;
        }
        let result = path
            .parse::<DocumentPath>()
            .and_then(|doc| andare::render_document(&source, &doc, renderer));
        match result {
            Ok(_) => info!("OK {}", path),
            Err(e) => {
                error!("{}: {:#}", path, e);
                failures.push(path.to_string());
            }
        }
    }

    failures
}

fn print_tree(entries: &[DiffEntry], extension: &str) -> Result<()> {
    let tree = ContentTree::from_entries(entries, extension);
    println!(
        "{}",
        serde_json::to_string_pretty(&tree).context("Failed to serialize contents")?
    );
    Ok(())
}

/// Reads a whole file, or stdin for `-`.
fn read_input(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        return io::read_to_string(io::stdin()).context("Failed to read stdin");
    }
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn write_page(file: &Path, html: &str) -> Result<()> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(file, html).with_context(|| format!("Failed to write {}", file.display()))?;
    info!("Generated: {}", file.display());
    Ok(())
}
