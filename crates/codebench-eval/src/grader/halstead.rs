//! Halstead difficulty, a lexical complexity heuristic.
//!
//! Tokens are split on whitespace. A token equal to a lexicon entry is an
//! operator. A token is an operand when it is not an operator and contains
//! no symbolic operator; word operators (`and`, `in`, ...) only count as
//! whole tokens, so `print` or `format` stay operands.
//!
//! difficulty = (unique_operators / 2) * (operand_count / unique_operands)

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use codebench_core::logging::log_solution_graded;
use codebench_core::HalsteadConfig;

use super::{solutions_for, Grader};
use crate::grading::{GradingOutput, SolutionGrade};
use crate::problem::{LLMSolution, ProblemDefinition};

/// Token counts behind a difficulty value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalsteadMetrics {
    pub unique_operators: usize,
    pub operand_count: usize,
    pub unique_operands: usize,
}

impl HalsteadMetrics {
    /// Difficulty; zero when the code has no operands.
    pub fn difficulty(&self) -> f64 {
        if self.unique_operands == 0 {
            return 0.0;
        }
        (self.unique_operators as f64 / 2.0)
            * (self.operand_count as f64 / self.unique_operands as f64)
    }
}

/// Operator lexicon split into symbolic and word operators.
#[derive(Debug, Clone)]
pub struct OperatorLexicon {
    all: HashSet<String>,
    symbols: Vec<String>,
}

impl OperatorLexicon {
    pub fn new<I, S>(operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let all: HashSet<String> = operators.into_iter().map(Into::into).collect();
        let symbols = all
            .iter()
            .filter(|op| !op.chars().all(|c| c.is_alphabetic()))
            .cloned()
            .collect();
        Self { all, symbols }
    }

    pub fn is_operator(&self, token: &str) -> bool {
        self.all.contains(token)
    }

    pub fn is_operand(&self, token: &str) -> bool {
        !self.is_operator(token) && !self.symbols.iter().any(|op| token.contains(op.as_str()))
    }

    /// Count operators and operands of `code`.
    pub fn measure(&self, code: &str) -> HalsteadMetrics {
        let mut unique_operators = HashSet::new();
        let mut unique_operands = HashSet::new();
        let mut operand_count = 0;

        for token in code.split_whitespace() {
            if self.is_operator(token) {
                unique_operators.insert(token);
            } else if self.is_operand(token) {
                operand_count += 1;
                unique_operands.insert(token);
            }
        }

        HalsteadMetrics {
            unique_operators: unique_operators.len(),
            operand_count,
            unique_operands: unique_operands.len(),
        }
    }
}

impl Default for OperatorLexicon {
    fn default() -> Self {
        Self::new(HalsteadConfig::default().operators)
    }
}

/// Halstead difficulty of `code` under the default Python lexicon.
pub fn halstead_difficulty(code: &str) -> f64 {
    OperatorLexicon::default().measure(code).difficulty()
}

pub struct HalsteadGrader {
    lexicon: OperatorLexicon,
}

impl HalsteadGrader {
    pub const IDENTIFIER: &'static str = "halstead";

    pub fn new() -> Self {
        Self {
            lexicon: OperatorLexicon::default(),
        }
    }

    pub fn from_config(config: &HalsteadConfig) -> Self {
        Self {
            lexicon: OperatorLexicon::new(config.operators.iter().cloned()),
        }
    }
}

impl Default for HalsteadGrader {
    fn default() -> Self {
        Self::new()
    }
}

impl Grader for HalsteadGrader {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    fn grade(&self, problems: &[ProblemDefinition], solutions: &[LLMSolution]) -> GradingOutput {
        let mut output = GradingOutput::new(Self::IDENTIFIER);
        for problem in problems {
            info!(problem = %problem.identifier, grader = Self::IDENTIFIER, "Grading problem");
            for solution in solutions_for(problem, solutions) {
                let metrics = self.lexicon.measure(&solution.solution_code);
                let sub_criteria = BTreeMap::from([
                    ("unique_operators".to_string(), metrics.unique_operators as f64),
                    ("operand_count".to_string(), metrics.operand_count as f64),
                    ("unique_operands".to_string(), metrics.unique_operands as f64),
                ]);
                let grade = SolutionGrade::for_solution(solution, metrics.difficulty())
                    .with_sub_criteria(sub_criteria);
                log_solution_graded(
                    Self::IDENTIFIER,
                    &problem.identifier,
                    &solution.model_identifier,
                    grade.score,
                    0,
                );
                output.add_grade(grade);
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn test_counts_spaced_expression() {
        // operators: = + ; operands: x a b a
        let metrics = OperatorLexicon::default().measure("x = a + b + a");
        assert_eq!(metrics.unique_operators, 2);
        assert_eq!(metrics.operand_count, 4);
        assert_eq!(metrics.unique_operands, 3);
        assert!((metrics.difficulty() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_symbol_inside_token_is_not_an_operand() {
        let lexicon = OperatorLexicon::default();
        assert!(!lexicon.is_operand("add(a,"));
        assert!(!lexicon.is_operand("x.y"));
        assert!(lexicon.is_operand("print"));
        assert!(lexicon.is_operand("format"));
        assert!(lexicon.is_operator("in"));
        assert!(!lexicon.is_operand("in"));
    }

    #[test]
    fn test_no_operands_is_zero() {
        assert_eq!(halstead_difficulty(""), 0.0);
        assert_eq!(halstead_difficulty("( ) + -"), 0.0);
    }

    #[test]
    fn test_grade_records_sub_criteria() {
        let code = "def add(a, b):\n    return a + b\n";
        let output = HalsteadGrader::new().grade(&[add_problem()], &[solution("m", code)]);
        assert_eq!(output.grader_identifier, "halstead");
        let grade = &output.solution_grades[0];
        let sub = grade.sub_criteria_scores.as_ref().unwrap();
        // `add(a,` and `b):` hold delimiters; operands are def return a b
        assert_eq!(sub["unique_operators"], 1.0);
        assert_eq!(sub["operand_count"], 4.0);
        assert_eq!(sub["unique_operands"], 4.0);
        assert!((grade.score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_custom_lexicon() {
        let config = HalsteadConfig {
            operators: vec!["plus".into()],
        };
        let grader = HalsteadGrader::from_config(&config);
        let output = grader.grade(&[add_problem()], &[solution("m", "a plus b")]);
        assert!((output.solution_grades[0].score - 0.5).abs() < 1e-12);
    }
}
