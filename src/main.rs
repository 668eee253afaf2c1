// src/main.rs
use brine::cli::Args;
use brine::emit::{generate_x64, write_assembly};
use brine::error::compile_error::CompileError;
use brine::error::error_reporter::ErrorReporter;
use brine::ir::generator::generate_unit;
use brine::ir::printer::graphviz;
use brine::isel::select_x64;
use brine::lexer::{tokenize_with_errors, Lexer};
use brine::opt::Optimizer;
use brine::parser::brine_parser::BrineParser;
use brine::schedule::run_global_code_motion;
use brine::semantic::lowering::lower_unit;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            let reporter = ErrorReporter::new(brine::location::line_tracker::LineTracker::new(
                &args.input.display().to_string(),
                "",
            ));
            reporter.report_errors(&[CompileError::Io(e)]);
            return ExitCode::FAILURE;
        }
    };

    let file_path = args.input.display().to_string();
    let mut lexer = Lexer::new(&file_path, &source);
    let line_tracker = lexer.line_tracker().clone();
    let (tokens, mut errors) = tokenize_with_errors(&mut lexer);

    let (functions, mut parse_errors) = BrineParser::new(tokens).parse();
    errors.append(&mut parse_errors);

    let (unit, mut sem_errors) = lower_unit(&functions);
    errors.append(&mut sem_errors);

    if !errors.is_empty() {
        ErrorReporter::new(line_tracker).report_errors(&errors);
        return ExitCode::FAILURE;
    }

    let mut optimizer = Optimizer::new();
    for mut func in generate_unit(&unit) {
        if args.dump_ir {
            eprintln!("{}", graphviz(&func));
        }

        optimizer.optimize(&mut func);
        brine::ir::finalize(&func);
        if args.dump_ir {
            eprintln!("{}", graphviz(&func));
        }

        let target = select_x64(&func);
        let schedule = run_global_code_motion(&target);
        let machine = generate_x64(&target, &schedule);
        print!("{}", write_assembly(&machine));
    }

    ExitCode::SUCCESS
}
