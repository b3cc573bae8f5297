use std::sync::Arc;

use crate::db::schema::{KeyRole, SchemaSnapshot};
use crate::llm::LlmClient;
use crate::security::{GuardError, SqlGuard};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("OpenAI API key is not configured. Please set OPENAI_API_KEY environment variable.")]
    NotConfigured,

    #[error("Prompt is required")]
    PromptRequired,

    #[error("LLM request failed: {0}")]
    LlmRequestFailed(String),

    #[error("Generated SQL is invalid: {0}")]
    GeneratedSqlInvalid(GuardError),
}

/// Turns a natural-language request into guarded SQL for one target schema.
pub struct NaturalLanguageTranslator {
    llm: Option<Arc<dyn LlmClient>>,
    guard: SqlGuard,
}

impl NaturalLanguageTranslator {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, guard: SqlGuard) -> Self {
        Self { llm, guard }
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Ask the LLM for SQL answering `prompt` and run the answer through the
    /// guard. The returned text is exactly what the guard approved.
    pub async fn translate(&self, prompt: &str, schema: &SchemaSnapshot) -> Result<String, TranslateError> {
        let llm = self.llm.as_ref().ok_or(TranslateError::NotConfigured)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TranslateError::PromptRequired);
        }

        let system = system_prompt(&build_schema_description(schema));
        log::info!("Requesting SQL for prompt ({} chars)", prompt.len());
        let answer = llm
            .complete(&system, prompt)
            .await
            .map_err(|e| TranslateError::LlmRequestFailed(format!("{:#}", e)))?;

        let cleaned = strip_code_fences(&answer);
        let parsed = self
            .guard
            .parse_sql(&cleaned)
            .map_err(TranslateError::GeneratedSqlInvalid)?;
        log::info!("Generated SQL: {}", parsed.sql);
        Ok(parsed.sql)
    }
}

fn system_prompt(schema_description: &str) -> String {
    format!(
        "You are a SQL expert. Generate SQL SELECT queries based on natural language descriptions.
You have access to the following database schema:

{schema_description}

Rules:
1. Only generate SELECT queries
2. Use proper SQL syntax
3. Use table and column names exactly as shown in the schema
4. Do not include LIMIT clause unless explicitly requested
5. Return only the SQL query, no explanations or markdown formatting
6. If the query is ambiguous, make reasonable assumptions based on the schema"
    )
}

/// Render a schema as the plain-text listing embedded in the system prompt.
pub fn build_schema_description(schema: &SchemaSnapshot) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !schema.tables.is_empty() {
        parts.push("Tables:".to_string());
        for table in &schema.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|col| {
                    let mut constraints = Vec::new();
                    match col.key_role {
                        KeyRole::Primary => constraints.push("PRIMARY KEY"),
                        KeyRole::Unique => constraints.push("UNIQUE"),
                        KeyRole::Indexed | KeyRole::None => {}
                    }
                    if !col.nullable {
                        constraints.push("NOT NULL");
                    }
                    if constraints.is_empty() {
                        format!("  - {}: {}", col.name, col.column_type)
                    } else {
                        format!("  - {}: {} ({})", col.name, col.column_type, constraints.join(", "))
                    }
                })
                .collect();
            parts.push(format!("\n{}:\n{}", table.name, columns.join("\n")));
        }
    }

    if !schema.views.is_empty() {
        parts.push("\nViews:".to_string());
        for view in &schema.views {
            let columns: Vec<String> = view
                .columns
                .iter()
                .map(|col| format!("  - {}: {}", col.name, col.column_type))
                .collect();
            parts.push(format!("\n{}:\n{}", view.name, columns.join("\n")));
        }
    }

    parts.join("\n")
}

/// Remove a Markdown code fence wrapped around a completion.
pub fn strip_code_fences(text: &str) -> String {
    let mut sql = text.trim();

    if sql.get(..6).is_some_and(|head| head.eq_ignore_ascii_case("```sql")) {
        sql = &sql[6..];
        sql = sql.strip_prefix('\n').unwrap_or(sql);
    }
    if let Some(rest) = sql.strip_prefix("```") {
        sql = rest.strip_prefix('\n').unwrap_or(rest);
    }
    if let Some(rest) = sql.strip_suffix("```") {
        sql = rest.strip_suffix('\n').unwrap_or(rest);
    }

    sql.trim().to_string()
}
