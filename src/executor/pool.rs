use crate::{error::BuildError, executor::BuildContext, runner::CommandRunner, sync::broadcast};
use core::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

/// Starts `workers` threads over the shared context and joins them all.
pub(super) fn run<R: CommandRunner + 'static>(
    workers: NonZeroUsize,
    context: Arc<BuildContext<R>>,
) -> Result<(), BuildError> {
    info!(
        workers = workers.get(),
        rules = context.repository.len(),
        "starting build"
    );
    broadcast(workers, move |worker| context.work(worker))?;
    info!("all workers joined");
    Ok(())
}
