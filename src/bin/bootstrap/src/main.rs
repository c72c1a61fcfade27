use std::process::exit;

use boot_image::MappedImageLoader;
use substrate::{
    hooks::NATIVE_HOOKS, ArgVector, BootConfig, Bootstrap, BootstrapContext, BootstrapError,
};
use tracing::info;

fn fail(err: BootstrapError) -> ! {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    exit(code)
}

fn run(config: BootConfig) -> Result<i32, BootstrapError> {
    let args = ArgVector::from_env()?;
    // Only consulted on platforms without a self link.
    let exe = std::env::current_exe().ok();
    let ctx = BootstrapContext::resolve(exe.as_deref())?.install();

    info!("bootstrapping VM from {}", ctx.executable_dir().display());
    Bootstrap::new(MappedImageLoader::new(), config).run(ctx, &args)
}

fn main() {
    let config = BootConfig::from_env().unwrap_or_else(|e| fail(e));

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .without_time()
            .with_writer(std::io::stderr)
            .with_max_level(config.log_level)
            .finish(),
    )
    .expect("setting default subscriber failed");

    // Keep the exported hooks alive through linking.
    std::hint::black_box(&NATIVE_HOOKS);

    let code = run(config).unwrap_or_else(|e| fail(e));
    exit(code);
}
