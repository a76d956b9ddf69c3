//! Prompt construction for the relevance filter.

/// System prompt fixing the task and the JSON output contract.
const SYSTEM_PROMPT: &str = "You are an assistant that evaluates scientific papers for inclusion \
in a research corpus.
Your task is to decide if a given article (title + abstract) is RELEVANT or NOT RELEVANT based on \
two criteria:
1. Inclusive criteria: conditions that the paper must satisfy to be considered relevant.
2. Exclusive criteria: conditions that disqualify a paper, even if the inclusive criteria are met.

Output ONLY a valid JSON object in this exact format:
{
  \"match\": true or false,
  \"explanation\": \"a brief one-sentence justification for the decision\"
}

Keep the explanation short and factual. Do not include any additional commentary or text outside \
of this JSON format.";

/// A (system, user) prompt pair for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPrompt {
    pub system: String,
    pub user: String,
}

/// Builds the prompt pair for one article.
#[must_use]
pub fn build_filter_prompt(
    query: &str,
    exclude: &str,
    title: &str,
    abstract_text: Option<&str>,
) -> FilterPrompt {
    let text = match abstract_text {
        Some(abstract_text) => format!("{title}\n{abstract_text}"),
        None => format!("{title}\n"),
    };

    let user = format!(
        "Inclusive criteria: {query}\n\
         Exclusive criteria: {exclude}\n\n\
         For the article below, answer ONLY with a JSON object with two fields:\n  \
         - match: true or false (boolean)\n  \
         - explanation: a short 1-2 sentence justification (string)\n\n\
         Do NOT include any additional text.\n\n\
         Article:\n{text}"
    );

    FilterPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_criteria_and_article() {
        let prompt = build_filter_prompt(
            "2D semantic segmentation",
            "3D or volumetric",
            "A Survey of Pixel-wise Methods",
            Some("We review pixel-level approaches."),
        );
        assert!(prompt.user.contains("Inclusive criteria: 2D semantic segmentation"));
        assert!(prompt.user.contains("Exclusive criteria: 3D or volumetric"));
        assert!(prompt.user.contains("A Survey of Pixel-wise Methods"));
        assert!(prompt.user.contains("We review pixel-level approaches."));
        assert!(prompt.system.contains("valid JSON object"));
    }

    #[test]
    fn test_prompt_without_abstract_still_builds() {
        let prompt = build_filter_prompt("q", "", "Only a Title", None);
        assert!(prompt.user.contains("Only a Title"));
    }
}
