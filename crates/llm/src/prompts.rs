//! Prompt templates for the templated model calls.
//!
//! Each builder returns the system preamble and the user prompt separately so
//! the provider can place them in the right slots.

use crate::assistant::{
    ContextualSuggestionInput, GenerateCodeInput, InlineSuggestionInput, RefactorCodeInput,
    SummarizeCodeInput,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParts {
    pub preamble: &'static str,
    pub prompt: String,
}

const SUMMARIZE_PREAMBLE: &str = "You are an expert software developer. Summarize code files \
clearly and concisely. Always mention the file name in the summary.";

const REFACTOR_PREAMBLE: &str = "You are an expert software engineer specializing in code \
refactoring. Only output the refactored code, without any additional explanation or markdown \
formatting.";

const CONTEXTUAL_PREAMBLE: &str = "You are an AI assistant specializing in providing code \
suggestions based on the context of the current workspace. Provide a code suggestion that is \
relevant and precise. Focus on the current file and programming language.";

const INLINE_PREAMBLE: &str = "You are an expert programmer AI providing a single-line code \
completion. Only provide the code that should come after the cursor. Do not repeat the code \
that is already there. Do not add any explanation or markdown formatting.";

const GENERATE_PREAMBLE: &str = "You are an expert programmer. Write the code the user asks \
for. Only output code, without surrounding explanation or markdown fences.";

pub fn summarize(input: &SummarizeCodeInput) -> PromptParts {
    PromptParts {
        preamble: SUMMARIZE_PREAMBLE,
        prompt: format!(
            "Please summarize the following code file.\n\nFile Name: {}\nCode:\n{}",
            input.file_name, input.code
        ),
    }
}

pub fn refactor(input: &RefactorCodeInput) -> PromptParts {
    PromptParts {
        preamble: REFACTOR_PREAMBLE,
        prompt: format!(
            "Refactor the following code from the file '{}' based on the user's request.\n\n\
             Request: {}\n\nOriginal Code:\n```\n{}\n```\n",
            input.file_name, input.request, input.code
        ),
    }
}

pub fn contextual_suggestion(input: &ContextualSuggestionInput) -> PromptParts {
    PromptParts {
        preamble: CONTEXTUAL_PREAMBLE,
        prompt: format!(
            "The user is currently editing the following file:\n\n```\n{}\n```\n\n\
             The user has the following query:\n\n\"\"\"\n{}\n\"\"\"",
            input.current_file_content, input.query
        ),
    }
}

pub fn inline_suggestion(input: &InlineSuggestionInput) -> PromptParts {
    PromptParts {
        preamble: INLINE_PREAMBLE,
        prompt: format!(
            "The user is writing a file in {}.\nThe full file content is:\n```\n{}\n```\n\n\
             Complete the following line of code:\n```\n{}\n```",
            input.language, input.full_content, input.line
        ),
    }
}

pub fn generate(input: &GenerateCodeInput) -> PromptParts {
    PromptParts {
        preamble: GENERATE_PREAMBLE,
        prompt: input.prompt.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refactor_prompt_carries_file_name_request_and_code() {
        let parts = refactor(&RefactorCodeInput {
            code: "let x = 1;".to_string(),
            file_name: "src/main.rs".to_string(),
            request: "rename x to count".to_string(),
        });

        assert_eq!(parts.preamble, REFACTOR_PREAMBLE);
        assert!(parts.prompt.contains("'src/main.rs'"));
        assert!(parts.prompt.contains("Request: rename x to count"));
        assert!(parts.prompt.contains("```\nlet x = 1;\n```"));
    }

    #[test]
    fn inline_prompt_names_the_language() {
        let parts = inline_suggestion(&InlineSuggestionInput {
            language: "rust".to_string(),
            line: "fn ma".to_string(),
            full_content: "fn ma".to_string(),
        });

        assert!(parts.prompt.starts_with("The user is writing a file in rust."));
        assert!(parts.prompt.ends_with("```\nfn ma\n```"));
    }
}
