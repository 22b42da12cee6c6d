//! Operator confirmation prompts

use crate::error::WorkflowError;

/// Yes/no confirmation from the operator
pub trait Prompter: Send + Sync {
    /// Ask `question`, returning the answer
    fn confirm(&self, question: &str) -> Result<bool, WorkflowError>;
}

/// Terminal prompt, or a fixed yes when `assume_yes` is set
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompter {
    assume_yes: bool,
}

impl DialoguerPrompter {
    /// Create a prompter; `assume_yes` answers every question with yes
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for DialoguerPrompter {
    fn confirm(&self, question: &str) -> Result<bool, WorkflowError> {
        if self.assume_yes {
            return Ok(true);
        }
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| WorkflowError::Prompt(e.to_string()))
    }
}

/// Prompter answering from a fixed script, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::sync::Mutex<std::collections::VecDeque<bool>>,
    asked: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedPrompter {
    /// Answer the questions in order; unscripted questions get `no`
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.iter().copied().collect()),
            asked: std::sync::Mutex::default(),
        }
    }

    /// Questions asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<bool, WorkflowError> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }
}
