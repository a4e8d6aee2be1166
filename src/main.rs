use std::process::ExitCode;

use log::{error, info};

use rootpatch::config::Options;
use rootpatch::elevate::{exec_shell, SetResUid};
use rootpatch::orchestrator::Orchestrator;
use rootpatch::resolver::build_prop::BuildPropDetector;
use rootpatch::resolver::kallsyms::KallsymsFile;
use rootpatch::resolver::registry::DeviceRegistry;
use rootpatch::resolver::AddressResolver;
use rootpatch::strategy::{DeviceStrategy, MemoryWindowStrategy};
use rootpatch::unlinked::Unlinked;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::default();
    let kallsyms = KallsymsFile::new(&options.kallsyms);

    let memory_window = MemoryWindowStrategy::new(Unlinked, kallsyms.clone(), Unlinked, SetResUid, &options);
    let device = DeviceStrategy::new(
        AddressResolver::new(
            DeviceRegistry::builtin().clone(),
            BuildPropDetector::new(&options.build_prop),
            kallsyms,
            options.target_symbol.as_str(),
        ),
        Unlinked,
        Unlinked,
        SetResUid,
    );

    let mut orchestrator = Orchestrator::new()
        .with_strategy(memory_window)
        .with_strategy(device);
    info!(
        "strategies: {}",
        orchestrator.strategies().collect::<Vec<_>>().join(", ")
    );
    if let Err(e) = orchestrator.run() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    info!("starting {}", options.shell.display());
    let e = exec_shell(&options.shell);
    error!("failed to exec {}: {e}", options.shell.display());
    ExitCode::FAILURE
}
