use clap::Parser;
use ember_driver::pipeline::{execute_compilation_pipeline, PipelineOptions};
use ember_driver::query::EmitQuery;
use ember_ir::AnalysisOptions;
use miette::{IntoDiagnostic, NamedSource};
use std::io::Read;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser)]
#[command(version, about, long_about = None)]
struct AppArgs {
    /// The input source. If this is `-`, the input is read from stdin.
    input: String,

    /// Should the plain AST be emitted?
    #[arg(long, default_value = "false")]
    emit_ast: bool,

    /// Should the analyzed IR be emitted?
    #[arg(long, default_value = "false")]
    emit_ir: bool,

    /// Emission queries to specify which items should be emitted, such as `ir.fn.main`.
    #[arg(long)]
    emit_query: Vec<String>,

    /// Number of passes over a runtime loop before its types must have stabilized.
    #[arg(long, default_value_t = AnalysisOptions::default().fixed_point_budget)]
    fixed_point_budget: u32,

    /// Number of backward branches one compile-time evaluation may take.
    #[arg(long, default_value_t = AnalysisOptions::default().backward_branch_quota)]
    branch_quota: u32,

    /// Keep instructions whose results are never used.
    #[arg(long, default_value = "false")]
    keep_dead_instructions: bool,
}

impl AppArgs {
    fn into_options(self) -> miette::Result<PipelineOptions> {
        let queries = EmitQuery::from_queries(self.emit_query.as_slice())?;
        Ok(PipelineOptions {
            emit_ast: self.emit_ast,
            emit_ir: self.emit_ir,
            queries,
            analysis: AnalysisOptions {
                fixed_point_budget: self.fixed_point_budget,
                backward_branch_quota: self.branch_quota,
                eliminate_dead_instructions: !self.keep_dead_instructions,
                ..AnalysisOptions::default()
            },
        })
    }
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("EMBER_LOG"))
        .with_writer(std::io::stderr)
        .init();
    let args = AppArgs::parse();

    let source = match args.input.as_str() {
        "-" => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .into_diagnostic()?;
            source
        }
        path => std::fs::read_to_string(path).into_diagnostic()?,
    };
    let source_code = NamedSource::new(&args.input, source.clone());
    let options = args.into_options()?;

    let result = || -> miette::Result<()> {
        execute_compilation_pipeline(options, &source)?;
        Ok(())
    }();
    result.map_err(|e| e.with_source_code(source_code))?;
    Ok(())
}
