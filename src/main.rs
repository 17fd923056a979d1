use std::path::PathBuf;
use std::process::ExitCode;

use principal_dir::errors::domain::{map_api_result, DomainError};
use principal_dir::executor::configure_shared_pool;
use principal_dir::logging::init_logging;
use principal_dir::{
    ApiError, DirectoryConfig, LoadState, Namespace, PrincipalDirectory, PrincipalPicker,
    SharedPoolExecutor,
};

const USAGE: &str =
    "usage: principal-dir [users|groups] [--filter TEXT] [--path PATH] [--config FILE] [--json]";

struct Args {
    namespace: Namespace,
    filter: Option<String>,
    path: Option<PathBuf>,
    config: Option<PathBuf>,
    json_errors: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        namespace: Namespace::User,
        filter: None,
        path: None,
        config: None,
        json_errors: false,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "users" | "owner" => parsed.namespace = Namespace::User,
            "groups" | "group" => parsed.namespace = Namespace::Group,
            "--filter" => parsed.filter = Some(args.next().ok_or("--filter needs a value")?),
            "--path" => parsed.path = Some(args.next().ok_or("--path needs a value")?.into()),
            "--config" => parsed.config = Some(args.next().ok_or("--config needs a value")?.into()),
            "--json" => parsed.json_errors = true,
            other => return Err(format!("unexpected argument: {other}")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    let config = match map_api_result(DirectoryConfig::load(args.config.as_deref())) {
        Ok(config) => config,
        Err(err) => {
            report(&err, args.json_errors);
            return ExitCode::from(2);
        }
    };
    init_logging(&config);
    configure_shared_pool(config.worker_threads);

    let directory = PrincipalDirectory::system(
        args.namespace,
        config.application_directory(),
        &SharedPoolExecutor,
    );
    match &args.path {
        Some(path) => {
            let picker = match map_api_result(PrincipalPicker::for_path(directory, path)) {
                Ok(picker) => picker,
                Err(err) => {
                    report(&err, args.json_errors);
                    return ExitCode::FAILURE;
                }
            };
            run(picker.directory(), &args, Some(&picker));
            exit_code(&picker.directory().load_state())
        }
        None => {
            run(&directory, &args, None);
            exit_code(&directory.load_state())
        }
    }
}

fn run(directory: &PrincipalDirectory, args: &Args, picker: Option<&PrincipalPicker>) {
    if let Some(filter) = &args.filter {
        directory.set_filter(filter.clone());
    }
    directory.wait_until_loaded();

    match directory.filtered_view() {
        LoadState::Loading => println!("Loading..."),
        LoadState::Error(err) => report(&err.to_api_error(), args.json_errors),
        LoadState::Success(list) => {
            if list.is_empty() {
                println!("No matching {}s", directory.namespace());
            }
            for principal in list.iter() {
                let marker = if directory.selection() == Some(principal.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:<32} {}",
                    principal.display_text(),
                    principal.primary_label().unwrap_or("System")
                );
            }
            if let Some(position) = picker.and_then(PrincipalPicker::take_scroll_target) {
                println!("initial position: {position}");
            }
        }
    }
}

fn report(err: &ApiError, json: bool) {
    if json {
        eprintln!("{}", err.to_json());
    } else {
        eprintln!("{err}");
    }
}

fn exit_code(state: &LoadState) -> ExitCode {
    match state {
        LoadState::Error(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
