//! Render state machine and executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use adgen_models::RunId;
use tracing::{debug, info, warn};

use crate::command::RenderEngine;
use crate::error::{MediaError, RenderStage, RenderStageError};
use crate::fs_utils::{move_file, remove_best_effort, verify_output};
use crate::probe::MediaProber;

use super::{RenderJob, RenderOutcome, RenderPlan, RenderSettings};

/// Position of a job in the render state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Normalize,
    Mux,
    Caption(usize),
    Done,
}

impl RenderState {
    /// Stage to execute in this state, `None` once done.
    pub fn stage(self) -> Option<RenderStage> {
        match self {
            RenderState::Normalize => Some(RenderStage::Normalize),
            RenderState::Mux => Some(RenderStage::Mux),
            RenderState::Caption(i) => Some(RenderStage::Caption(i)),
            RenderState::Done => None,
        }
    }

    /// State after the current stage succeeded.
    pub fn next(self, caption_passes: usize) -> Self {
        match self {
            RenderState::Normalize => RenderState::Mux,
            RenderState::Mux if caption_passes == 0 => RenderState::Done,
            RenderState::Mux => RenderState::Caption(0),
            RenderState::Caption(i) if i + 1 < caption_passes => RenderState::Caption(i + 1),
            RenderState::Caption(_) | RenderState::Done => RenderState::Done,
        }
    }
}

/// Executes render jobs one stage at a time.
#[derive(Clone)]
pub struct RenderPipeline {
    engine: Arc<dyn RenderEngine>,
    prober: Arc<dyn MediaProber>,
    settings: RenderSettings,
}

impl RenderPipeline {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        prober: Arc<dyn MediaProber>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            engine,
            prober,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `job`, releasing its source assets whatever the outcome.
    ///
    /// The job runs on its own task. Dropping the returned future detaches
    /// the job instead of cancelling it: the engine still reaches a terminal
    /// result before the scratch directory and leased assets are released.
    pub async fn render(&self, job: RenderJob) -> Result<RenderOutcome, RenderStageError> {
        let pipeline = self.clone();
        let run_id = job.run_id.clone();

        match tokio::spawn(async move { pipeline.render_to_completion(job).await }).await {
            Ok(result) => result,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Render task aborted");
                Err(RenderStageError::new(
                    RenderStage::Normalize,
                    MediaError::internal(format!("render task aborted: {e}")),
                ))
            }
        }
    }

    async fn render_to_completion(
        &self,
        mut job: RenderJob,
    ) -> Result<RenderOutcome, RenderStageError> {
        let result = self.run_job(&job).await;
        let released = job.assets.release();

        match &result {
            Ok(outcome) => info!(
                run_id = %job.run_id,
                final_path = %outcome.final_path.display(),
                caption_passes = outcome.caption_passes,
                released,
                "Render completed"
            ),
            Err(e) => warn!(
                run_id = %job.run_id,
                stage = %e.stage,
                error = %e.cause,
                released,
                "Render failed"
            ),
        }

        result
    }

    async fn run_job(&self, job: &RenderJob) -> Result<RenderOutcome, RenderStageError> {
        let setup = |e: MediaError| RenderStageError::new(RenderStage::Normalize, e);

        tokio::fs::create_dir_all(&self.settings.work_dir)
            .await
            .map_err(|e| setup(e.into()))?;

        // Removed on drop, on every exit path
        let scratch = tempfile::Builder::new()
            .prefix(&format!("render_{}_", job.run_id))
            .tempdir_in(&self.settings.work_dir)
            .map_err(|e| setup(e.into()))?;

        let plan = RenderPlan::build(
            &job.timeline,
            &job.audio_path,
            job.captions.as_deref(),
            job.total_duration,
            &self.settings,
            scratch.path(),
        )
        .map_err(setup)?;

        debug!(
            run_id = %job.run_id,
            stages = plan.stages().len(),
            scratch = %scratch.path().display(),
            "Render plan built"
        );

        let mut state = RenderState::Normalize;
        let mut last_stage = RenderStage::Normalize;
        while let Some(stage) = state.stage() {
            self.run_stage(&plan, stage, &job.run_id).await?;
            last_stage = stage;
            state = state.next(plan.caption_passes());
        }

        move_file(plan.final_output(), &job.output_path)
            .await
            .map_err(|e| RenderStageError::new(last_stage, e))?;

        let (normalized_path, muxed_path) = if self.settings.keep_intermediates {
            self.keep_intermediates(&plan, &job.output_path).await
        } else {
            (None, None)
        };

        let measured_duration = self.measure(job).await;

        Ok(RenderOutcome {
            final_path: job.output_path.clone(),
            normalized_path,
            muxed_path,
            caption_passes: plan.caption_passes(),
            measured_duration,
        })
    }

    async fn run_stage(
        &self,
        plan: &RenderPlan,
        stage: RenderStage,
        run_id: &RunId,
    ) -> Result<(), RenderStageError> {
        let cmd = plan
            .command(stage)
            .ok_or_else(|| RenderStageError::new(stage, MediaError::internal("stage not in plan")))?;

        info!(run_id = %run_id, stage = %stage, "Render stage started");
        let started = Instant::now();

        let result = match self.engine.execute(cmd).await {
            Ok(()) => verify_output(cmd.output(), self.settings.min_output_bytes)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        metrics::histogram!("adgen_render_stage_duration_seconds", "stage" => stage.label())
            .record(started.elapsed().as_secs_f64());

        if let Err(cause) = result {
            // Never leave a partial stage artifact behind
            remove_best_effort(cmd.output());
            return Err(RenderStageError::new(stage, cause));
        }

        debug!(
            run_id = %run_id,
            stage = %stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render stage finished"
        );
        Ok(())
    }

    async fn keep_intermediates(
        &self,
        plan: &RenderPlan,
        output: &Path,
    ) -> (Option<PathBuf>, Option<PathBuf>) {
        let normalized = keep(plan.normalized_output(), output, "normalized").await;
        // Without captions the muxed file already became the final output
        let muxed = if plan.caption_passes() > 0 {
            keep(plan.muxed_output(), output, "muxed").await
        } else {
            None
        };
        (normalized, muxed)
    }

    async fn measure(&self, job: &RenderJob) -> Option<f64> {
        match self.prober.duration(&job.output_path).await {
            Ok(measured) => {
                let drift = (measured - job.total_duration).abs();
                if drift > self.settings.profile.frame_interval() {
                    warn!(
                        run_id = %job.run_id,
                        measured,
                        expected = job.total_duration,
                        "Final duration differs from narration by more than one frame"
                    );
                }
                Some(measured)
            }
            Err(e) => {
                warn!(run_id = %job.run_id, error = %e, "Could not probe final output");
                None
            }
        }
    }
}

async fn keep(src: &Path, output: &Path, suffix: &str) -> Option<PathBuf> {
    let dst = sibling(output, suffix);
    match move_file(src, &dst).await {
        Ok(()) => Some(dst),
        Err(e) => {
            warn!(path = %src.display(), error = %e, "Could not keep intermediate");
            None
        }
    }
}

/// `<dir>/<stem>_<suffix>.mp4` next to `output`.
fn sibling(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}_{suffix}.mp4"))
}
