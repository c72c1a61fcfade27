//! The native substrate of a boot-image VM.
//!
//! Before any managed code exists, something native has to get it going. That is this
//! crate's whole job:
//!   1. Work out where the executable lives, and so where the boot image is ([path]).
//!   2. Have an [ImageLoader] load the image, giving us a header and a heap base.
//!   3. Build the memory the managed runtime expects at start-up ([primordial]): the
//!      primordial VM thread locals and the auxiliary space.
//!   4. Call the VM run method compiled into the image, with a fixed argument list
//!      ([entry]), and hand it the [linker::LinkerBridge] so it can dlopen/dlsym.
//!   5. Close the image when the call returns, and return its exit code.
//!
//! After step 4 managed code is in charge. It may call back into the exported native hooks
//! ([hooks]) from any of its threads.
//!
//! Every failure before step 4 is fatal to the process, and comes back as a
//! [BootstrapError] with its own exit status.

pub mod args;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod linker;
pub mod path;
pub mod primordial;

pub use args::ArgVector;
use boot_image::{BootImage, ImageLoader};
pub use config::BootConfig;
pub use context::BootstrapContext;
pub use entry::{EntryArgs, EntryPoint, VmRunFn};
pub use error::BootstrapError;
use linker::LinkerBridge;
use primordial::{with_primordial_locals, AuxiliarySpace};
use tracing::{debug, info, warn};

/// A bootstrap run: a loader to get the image, configuration, and the linker bridge to give
/// to managed code.
pub struct Bootstrap<L> {
    loader: L,
    config: BootConfig,
    linker: LinkerBridge,
}

impl<L: ImageLoader> Bootstrap<L> {
    pub fn new(loader: L, config: BootConfig) -> Self {
        Self {
            loader,
            config,
            linker: LinkerBridge::NATIVE,
        }
    }

    /// Replace the linker bridge handed to the entry point.
    pub fn with_linker(mut self, linker: LinkerBridge) -> Self {
        self.linker = linker;
        self
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Load the image, build primordial memory and run the VM. Blocks until the VM run
    /// method returns, and returns its exit code unchanged.
    pub fn run(&self, ctx: &BootstrapContext, args: &ArgVector) -> Result<i32, BootstrapError> {
        debug!("arguments: argc {}, argv {:p}", args.argc(), args.argv());
        for (i, arg) in args.iter().enumerate() {
            debug!("arg[{}]: {:?}", i, arg);
        }
        match std::env::var_os("LD_LIBRARY_PATH") {
            Some(paths) => debug!("LD_LIBRARY_PATH: {}", paths.to_string_lossy()),
            None => debug!("LD_LIBRARY_PATH not set"),
        }

        let path = ctx.image_path(&self.config);
        info!("loading boot image {}", path.display());
        let image = self
            .loader
            .load(&path)
            .map_err(|source| BootstrapError::ImageLoad {
                path: path.clone(),
                source,
            })?;

        let header = *image.header();
        let heap_base = image.heap_base();
        debug!(
            "image header: entry offset {}, thread locals {} bytes, auxiliary space {} bytes; heap at {}",
            header.entry_offset, header.thread_locals_size, header.auxiliary_space_size, heap_base
        );
        let entry = EntryPoint::resolve(heap_base, &header)?;

        let exit_code = with_primordial_locals(&header, |locals| {
            let aux = AuxiliarySpace::allocate(&header, self.config.extra_reserve)?;
            let entry_args = EntryArgs::new(&locals, heap_base, &aux, self.linker, args);
            debug!(
                "entering VM run method: primordial locals {}, heap {}, auxiliary space {}, open library {:p}, resolve symbol {:p}, argc {}, argv {:p}",
                entry_args.primordial_locals,
                entry_args.heap_base,
                entry_args.auxiliary_space,
                entry_args.linker.open_library as *const (),
                entry_args.linker.resolve_symbol as *const (),
                entry_args.argc,
                entry_args.argv
            );
            // Safety: the image loader put code with the VmRunFn signature at the entry offset.
            // The locals block is live until this closure returns, the auxiliary space is
            // never freed, and args outlives this call.
            Ok::<_, BootstrapError>(unsafe { entry.invoke(&entry_args) })
        })??;
        info!("VM run method exited with code {}", exit_code);

        if let Err(e) = image.close() {
            warn!("could not close image file: {}", e);
        }

        Ok(exit_code)
    }
}
