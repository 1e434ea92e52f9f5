use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::JobConfig;
use crate::dsl::{self, CompileError, FilterAst, matches};
use crate::extract::resolve_references;
use crate::model::KindMask;
use crate::sink::{EntitySink, JsonlSink};
use crate::source::{EntitySource, JsonlSource};
use crate::spatial::SpatialState;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input entity file (JSONL; nodes, then ways, then relations)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file, or `-` for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Filter expression; when absent every entity matches
    #[arg(short, long)]
    pub expression: Option<String>,

    /// Job configuration file (YAML); CLI flags take precedence
    #[arg(short, long)]
    pub job: Option<PathBuf>,

    /// Kinds eligible for direct filtering, as letters n/w/r (default all)
    #[arg(short, long)]
    pub kinds: Option<String>,

    /// Also emit every entity the matching set references, transitively
    #[arg(long)]
    pub include_refs: bool,

    /// Report per-kind match counts instead of writing entities
    #[arg(long)]
    pub count: bool,

    /// Stop after this many matches (ignored with --include-refs)
    #[arg(long)]
    pub max_results: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Fully resolved job settings: config file merged with CLI overrides
/// and the expression compiled.
pub struct Job {
    pub filter: Option<FilterAst>,
    pub mask: KindMask,
    pub include_refs: bool,
    pub max_results: Option<u64>,
}

pub fn assemble_job(cli: &Cli) -> Result<Job> {
    let file = match &cli.job {
        Some(path) => {
            JobConfig::load(path).with_context(|| format!("CLI: failed to load job {path:?}"))?
        }
        None => JobConfig::default(),
    };

    let expression = cli.expression.clone().or(file.expression);
    let filter = match expression.as_deref() {
        Some(expr) => {
            Some(dsl::compile(expr).map_err(|err| anyhow!(render_compile_error(expr, &err)))?)
        }
        None => None,
    };

    let mask = match cli.kinds.clone().or(file.kinds) {
        Some(letters) => KindMask::from_str(&letters).map_err(|err| anyhow!("CLI: {err}"))?,
        None => KindMask::all(),
    };

    Ok(Job {
        filter,
        mask,
        include_refs: cli.include_refs || file.include_refs.unwrap_or(false),
        max_results: cli.max_results.or(file.max_results),
    })
}

/// Point at the offending token with a caret line.
pub fn render_compile_error(expr: &str, err: &CompileError) -> String {
    format!(
        "invalid filter expression: {}\n  {}\n  {}^",
        err.message,
        expr,
        " ".repeat(err.offset)
    )
}

pub fn init_sink(output: &Path) -> Result<Box<dyn EntitySink + Send>> {
    if output == Path::new("-") {
        tracing::info!("Sink: stdout");
        Ok(Box::new(JsonlSink::stdout()))
    } else {
        tracing::info!("Sink: {:?}", output);
        Ok(Box::new(
            JsonlSink::new(output)
                .with_context(|| format!("Sink: failed to create {output:?}"))?,
        ))
    }
}

pub fn run(cli: &Cli) -> Result<u64> {
    let job = assemble_job(cli)?;
    let source = JsonlSource::new(&cli.input);

    if let Some(filter) = &job.filter {
        tracing::info!("Filter: {}", filter);
    } else {
        tracing::info!("Filter: none (matching everything)");
    }
    tracing::info!("Kinds: {}", job.mask);

    if cli.count {
        let (nodes, ways, relations) = run_count(&job, &source)?;
        println!("nodes: {nodes}, ways: {ways}, relations: {relations}");
        return Ok(nodes + ways + relations);
    }

    let mut sink = init_sink(&cli.output)?;
    let written = if job.include_refs {
        run_extract(&job, &source, sink.as_mut())?
    } else {
        run_filter(&job, &source, sink.as_mut())?
    };
    sink.finish().context("Sink: failed to finalize output")?;
    Ok(written)
}

/// Single filtering pass. A bounding-box filter forces a scan over all
/// kinds so spatial containment can propagate, even when the mask only
/// makes a subset of kinds eligible for output.
pub fn run_filter<S: EntitySource + ?Sized>(
    job: &Job,
    source: &S,
    sink: &mut dyn EntitySink,
) -> Result<u64> {
    let requires_all = job
        .filter
        .as_ref()
        .is_some_and(|f| f.requires_all_entities());
    let scan_mask = if requires_all { KindMask::all() } else { job.mask };

    let mut spatial = SpatialState::new();
    let mut written = 0u64;
    for entity in source.scan(scan_mask)? {
        let entity = entity?;
        let matched = matches(job.filter.as_ref(), &entity, &mut spatial);
        if matched && job.mask.contains(entity.kind()) {
            sink.add_entity(&entity)?;
            written += 1;
            if job.max_results.is_some_and(|max| written >= max) {
                break;
            }
        }
    }
    Ok(written)
}

/// Resolve the reference closure, then emit during one final pass over
/// all kinds with fresh spatial state.
pub fn run_extract<S: EntitySource + ?Sized>(
    job: &Job,
    source: &S,
    sink: &mut dyn EntitySink,
) -> Result<u64> {
    if job.max_results.is_some() {
        tracing::warn!("--max-results is ignored with --include-refs");
    }

    let plan = resolve_references(job.filter.clone(), job.mask, source)?;
    let (nodes, ways, relations) = plan.referenced_counts();
    tracing::info!(
        "Closure resolved: {} node(s), {} way(s), {} relation(s) referenced",
        nodes,
        ways,
        relations
    );

    let mut spatial = SpatialState::new();
    let mut written = 0u64;
    for entity in source.scan(KindMask::all())? {
        let entity = entity?;
        if plan.should_emit(&entity, &mut spatial) {
            sink.add_entity(&entity)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Count direct matches per kind without writing anything.
pub fn run_count<S: EntitySource + ?Sized>(job: &Job, source: &S) -> Result<(u64, u64, u64)> {
    let requires_all = job
        .filter
        .as_ref()
        .is_some_and(|f| f.requires_all_entities());
    let scan_mask = if requires_all { KindMask::all() } else { job.mask };

    let mut spatial = SpatialState::new();
    let mut counts = (0u64, 0u64, 0u64);
    for entity in source.scan(scan_mask)? {
        let entity = entity?;
        let matched = matches(job.filter.as_ref(), &entity, &mut spatial);
        if matched && job.mask.contains(entity.kind()) {
            match &entity {
                crate::model::Entity::Node(_) => counts.0 += 1,
                crate::model::Entity::Way(_) => counts.1 += 1,
                crate::model::Entity::Relation(_) => counts.2 += 1,
            }
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Node, Tag, Way};
    use crate::source::MemorySource;

    struct CollectSink(Vec<Entity>);

    impl EntitySink for CollectSink {
        fn add_entity(&mut self, entity: &Entity) -> Result<()> {
            self.0.push(entity.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn sample() -> MemorySource {
        MemorySource::new(vec![
            Entity::Node(Node {
                id: 1,
                tags: vec![Tag::new("highway", "bus_stop")],
                lon: Some(0.0),
                lat: Some(0.0),
            }),
            Entity::Node(Node {
                id: 2,
                tags: Vec::new(),
                lon: Some(1.0),
                lat: Some(1.0),
            }),
            Entity::Way(Way {
                id: 10,
                tags: vec![Tag::new("highway", "primary")],
                refs: vec![1, 2],
            }),
        ])
    }

    fn job(expression: Option<&str>, mask: KindMask) -> Job {
        Job {
            filter: expression.map(|e| dsl::compile(e).unwrap()),
            mask,
            include_refs: false,
            max_results: None,
        }
    }

    #[test]
    fn filter_pass_respects_mask() {
        let mut sink = CollectSink(Vec::new());
        let written = run_filter(
            &job(Some(r#""highway""#), "n".parse().unwrap()),
            &sample(),
            &mut sink,
        )
        .unwrap();
        assert_eq!(written, 1);
        assert_eq!(sink.0[0].id(), 1);
    }

    #[test]
    fn max_results_truncates_output() {
        let mut sink = CollectSink(Vec::new());
        let mut j = job(None, KindMask::all());
        j.max_results = Some(2);
        let written = run_filter(&j, &sample(), &mut sink).unwrap();
        assert_eq!(written, 2);
    }

    #[test]
    fn count_pass_reports_per_kind_totals() {
        let totals = run_count(&job(Some(r#""highway""#), KindMask::all()), &sample()).unwrap();
        assert_eq!(totals, (1, 1, 0));
    }

    #[test]
    fn compile_errors_render_with_a_caret() {
        let expr = r#""a" & frob("x")"#;
        let err = dsl::compile(expr).unwrap_err();
        let rendered = render_compile_error(expr, &err);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].find('^'), Some(2 + err.offset));
    }
}
