//! Grader selection by short identifier, and the sequential grading run.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use codebench_core::logging::log_grader_skipped;
use codebench_core::AppConfig;

use crate::executor::ExecutionPrimitive;
use crate::grader::{
    CommandRaceDetector, CorrectnessGrader, DataRaceGrader, Grader, HalsteadGrader, LintRater,
    MemoryGrader, PerformanceGrader, QualityRater, RaceDetector, StaticAnalysisGrader,
};
use crate::grading::GradingOutput;
use crate::problem::{LLMSolution, ProblemDefinition};
use crate::report::GradingReport;

/// The closed set of graders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraderKind {
    Correctness,
    Performance,
    Memory,
    StaticAnalysis,
    DataRace,
    Halstead,
}

impl GraderKind {
    pub const ALL: [GraderKind; 6] = [
        GraderKind::Correctness,
        GraderKind::Performance,
        GraderKind::Memory,
        GraderKind::StaticAnalysis,
        GraderKind::DataRace,
        GraderKind::Halstead,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            GraderKind::Correctness => CorrectnessGrader::IDENTIFIER,
            GraderKind::Performance => PerformanceGrader::IDENTIFIER,
            GraderKind::Memory => MemoryGrader::IDENTIFIER,
            GraderKind::StaticAnalysis => StaticAnalysisGrader::IDENTIFIER,
            GraderKind::DataRace => DataRaceGrader::IDENTIFIER,
            GraderKind::Halstead => HalsteadGrader::IDENTIFIER,
        }
    }

    /// Exact identifier lookup.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.identifier() == name)
    }

    /// Identifier lookup falling back to correctness for unknown names.
    pub fn resolve(name: &str) -> Self {
        Self::lookup(name).unwrap_or_else(|| {
            debug!(name = name, "Unknown grader identifier, using correctness");
            GraderKind::Correctness
        })
    }

    pub fn description(self) -> &'static str {
        match self {
            GraderKind::Correctness => "fraction of test cases returning the expected value",
            GraderKind::Performance => "CPU time relative to the optimal solution, capped at 1",
            GraderKind::Memory => "peak memory relative to the optimal solution, capped at 1",
            GraderKind::StaticAnalysis => "lint rating normalized to [0, 1]",
            GraderKind::DataRace => "summed severity of data-race report blocks",
            GraderKind::Halstead => "Halstead difficulty of the source text",
        }
    }
}

impl fmt::Display for GraderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Builds graders sharing one execution primitive and configuration.
pub struct GraderRegistry {
    executor: Arc<dyn ExecutionPrimitive>,
    quality_rater: Arc<dyn QualityRater>,
    race_detector: Arc<dyn RaceDetector>,
    config: AppConfig,
}

impl GraderRegistry {
    /// Registry whose tool collaborators run the commands named in `config`.
    pub fn new(executor: Arc<dyn ExecutionPrimitive>, config: AppConfig) -> Self {
        Self {
            executor,
            quality_rater: Arc::new(LintRater::from_config(&config.lint)),
            race_detector: Arc::new(CommandRaceDetector::from_config(&config.race_detector)),
            config,
        }
    }

    pub fn with_quality_rater(mut self, rater: Arc<dyn QualityRater>) -> Self {
        self.quality_rater = rater;
        self
    }

    pub fn with_race_detector(mut self, detector: Arc<dyn RaceDetector>) -> Self {
        self.race_detector = detector;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn grader(&self, kind: GraderKind) -> Box<dyn Grader> {
        let executor = Arc::clone(&self.executor);
        match kind {
            GraderKind::Correctness => Box::new(CorrectnessGrader::from_config(
                executor,
                &self.config.correctness,
            )),
            GraderKind::Performance => Box::new(PerformanceGrader::from_config(
                executor,
                &self.config.performance,
            )),
            GraderKind::Memory => Box::new(MemoryGrader::from_config(executor, &self.config.memory)),
            GraderKind::StaticAnalysis => Box::new(StaticAnalysisGrader::from_config(
                Arc::clone(&self.quality_rater),
                &self.config.lint,
            )),
            GraderKind::DataRace => Box::new(DataRaceGrader::from_config(
                Arc::clone(&self.race_detector),
                &self.config.race_detector,
            )),
            GraderKind::Halstead => Box::new(HalsteadGrader::from_config(&self.config.halstead)),
        }
    }

    /// One grader per requested name, in request order.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Vec<Box<dyn Grader>> {
        names
            .iter()
            .map(|name| self.grader(GraderKind::resolve(name.as_ref())))
            .collect()
    }

    /// Run the requested graders one after another.
    ///
    /// A grader that refuses the problem set is skipped and recorded in the
    /// report.
    pub fn grade_all<S: AsRef<str>>(
        &self,
        names: &[S],
        problems: &[ProblemDefinition],
        solutions: &[LLMSolution],
    ) -> GradingReport {
        let mut report = GradingReport::new();
        for grader in self.resolve(names) {
            match self.run_grader(grader.as_ref(), problems, solutions) {
                Some(output) => report.add_output(output),
                None => report.add_skipped(grader.identifier()),
            }
        }
        report
    }

    /// Run one grader, or `None` when it refuses the problem set.
    pub fn run_grader(
        &self,
        grader: &dyn Grader,
        problems: &[ProblemDefinition],
        solutions: &[LLMSolution],
    ) -> Option<GradingOutput> {
        if !grader.can_grade(problems) {
            log_grader_skipped(grader.identifier(), problems.len());
            return None;
        }
        info!(
            grader = grader.identifier(),
            problems = problems.len(),
            solutions = solutions.len(),
            "Running grader"
        );
        Some(grader.grade(problems, solutions))
    }
}
