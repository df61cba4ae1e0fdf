// fulfillment/src/pipeline/step.rs

use super::ContextData;

pub type SkipCondition<TData> = std::sync::Arc<dyn Fn(&TData) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  /// A failing handler of a best-effort step is recorded and the run continues.
  pub best_effort: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub(crate) fn should_skip(&self, ctx: &ContextData<T>) -> bool {
    match &self.skip_if {
      Some(cond) => cond(&ctx.read()),
      None => false,
    }
  }
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("best_effort", &self.best_effort)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
