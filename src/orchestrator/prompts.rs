//! Prompt templates sent to the remote agent when a session is created.

use crate::models::session::IssueRef;

const NO_DESCRIPTION: &str = "No description provided";

/// Prompt asking for an action plan and a confidence score.
///
/// The requested answer format is what
/// [`extractor`](super::extractor) parses.
#[must_use]
pub fn scoping(issue: &IssueRef, title: &str, body: Option<&str>) -> String {
    let body = body.filter(|b| !b.trim().is_empty()).unwrap_or(NO_DESCRIPTION);
    format!(
        "Please analyze this GitHub issue and provide:\n\
         1. A detailed action plan (step-by-step approach)\n\
         2. A confidence score (1-100%) indicating your ability to resolve this issue\n\
         \n\
         Repository: {repo}\n\
         Issue Title: {title}\n\
         Issue Description: {body}\n\
         \n\
         Please format your response as:\n\
         ACTION PLAN:\n\
         [Your detailed step-by-step plan]\n\
         \n\
         CONFIDENCE SCORE: [Your confidence percentage]%\n",
        repo = issue.repo,
    )
}

/// Prompt asking the agent to implement a fix and open a pull request.
#[must_use]
pub fn resolving(issue: &IssueRef, title: &str, body: Option<&str>) -> String {
    let body = body.filter(|b| !b.trim().is_empty()).unwrap_or(NO_DESCRIPTION);
    format!(
        "Please resolve this GitHub issue by implementing the necessary changes:\n\
         \n\
         Repository: {repo}\n\
         Issue #{number}: {title}\n\
         Description: {body}\n\
         \n\
         Please:\n\
         1. Analyze the issue thoroughly\n\
         2. Implement the necessary code changes\n\
         3. Create a pull request with your solution\n\
         4. Provide regular updates on your progress\n\
         \n\
         Post updates as comments on the GitHub issue as you work.\n",
        repo = issue.repo,
        number = issue.issue_number,
    )
}
