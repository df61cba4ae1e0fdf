// fulfillment/src/pipeline/execution.rs

use crate::error::PipelineError;
use crate::pipeline::context_data::ContextData;
use crate::pipeline::control::{PipelineControl, PipelineOutcome, PipelineResult, StepFailure};
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A required step's handler error aborts the run and is returned. A
  /// best-effort step's handler error is recorded in the outcome and the
  /// run moves on to the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(pipeline = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineOutcome, Err> {
    let mut failures = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if step_def.should_skip(&ctx_data) {
        event!(Level::DEBUG, step = step_name, step_index = step_idx, "Step skipped.");
        continue;
      }

      let handlers = match self.on.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.best_effort => {
          event!(Level::DEBUG, step = step_name, "Best-effort step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step = step_name, "Required step has no handlers.");
          return Err(Err::from(PipelineError::HandlerMissing {
            step_name: step_def.name.clone(),
          }));
        }
      };

      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            event!(Level::DEBUG, step = step_name, "Pipeline stopped by handler.");
            return Ok(PipelineOutcome {
              result: PipelineResult::Stopped,
              failures,
            });
          }
          Err(e) if step_def.best_effort => {
            event!(Level::DEBUG, step = step_name, error = %e, "Best-effort step failed; continuing.");
            failures.push(StepFailure {
              step: step_def.name.clone(),
              message: e.to_string(),
            });
            break;
          }
          Err(e) => {
            event!(Level::ERROR, step = step_name, error = %e, "Required step failed.");
            return Err(e);
          }
        }
      }
    }

    Ok(PipelineOutcome {
      result: PipelineResult::Completed,
      failures,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FulfillmentError;
  use crate::pipeline::step::SkipCondition;
  use std::sync::Arc;

  #[derive(Default)]
  struct Trace {
    seen: Vec<&'static str>,
  }

  fn recording(name: &'static str) -> impl Fn(ContextData<Trace>) -> std::future::Ready<Result<PipelineControl, FulfillmentError>> {
    move |ctx: ContextData<Trace>| {
      ctx.write().seen.push(name);
      std::future::ready(Ok(PipelineControl::Continue))
    }
  }

  #[tokio::test]
  async fn best_effort_failure_is_recorded_and_run_continues() {
    let mut p = Pipeline::<Trace, FulfillmentError>::new("t", &[("a", true, None), ("b", false, None)]);
    p.on_root("a", |_ctx: ContextData<Trace>| async {
      Err::<PipelineControl, _>(FulfillmentError::Internal("boom".into()))
    });
    p.on_root("b", recording("b"));

    let ctx = ContextData::new(Trace::default());
    let outcome = p.run(ctx.clone()).await.unwrap();

    assert_eq!(outcome.result, PipelineResult::Completed);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].step, "a");
    assert!(outcome.failures[0].message.contains("boom"));
    assert_eq!(ctx.read().seen, vec!["b"]);
  }

  #[tokio::test]
  async fn required_failure_aborts() {
    let mut p = Pipeline::<Trace, FulfillmentError>::new("t", &[("a", false, None), ("b", false, None)]);
    p.on_root("a", |_ctx: ContextData<Trace>| async {
      Err::<PipelineControl, _>(FulfillmentError::Validation("bad".into()))
    });
    p.on_root("b", recording("b"));

    let ctx = ContextData::new(Trace::default());
    let err = p.run(ctx.clone()).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Validation(_)));
    assert!(ctx.read().seen.is_empty());
  }

  #[tokio::test]
  async fn skip_condition_and_stop() {
    let always: SkipCondition<Trace> = Arc::new(|_t: &Trace| true);
    let mut p = Pipeline::<Trace, FulfillmentError>::new(
      "t",
      &[
        ("skipped", false, Some(always)),
        ("halt", false, None),
        ("never", false, None),
      ],
    );
    p.on_root("skipped", recording("skipped"));
    p.on_root("halt", |ctx: ContextData<Trace>| {
      ctx.write().seen.push("halt");
      std::future::ready(Ok::<_, FulfillmentError>(PipelineControl::Stop))
    });
    p.on_root("never", recording("never"));

    let ctx = ContextData::new(Trace::default());
    let outcome = p.run(ctx.clone()).await.unwrap();
    assert_eq!(outcome.result, PipelineResult::Stopped);
    assert_eq!(ctx.read().seen, vec!["halt"]);
  }

  #[tokio::test]
  async fn required_step_without_handler_is_an_error() {
    let p = Pipeline::<Trace, FulfillmentError>::new("t", &[("lonely", false, None)]);
    let err = p.run(ContextData::new(Trace::default())).await.unwrap_err();
    assert!(matches!(
      err,
      FulfillmentError::Pipeline {
        source: PipelineError::HandlerMissing { .. }
      }
    ));
  }
}
