use once_cell::sync::Lazy;
use std::collections::HashMap;

// Fenced-code language tags keyed by lowercase extension (with leading dot).
static EXTENSION_LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        // Web & general
        (".js", "javascript"),
        (".ts", "typescript"),
        (".tsx", "tsx"),
        (".py", "python"),
        (".html", "html"),
        (".css", "css"),
        (".json", "json"),
        (".md", "markdown"),
        (".txt", ""),
        (".sh", "bash"),
        (".yml", "yaml"),
        (".yaml", "yaml"),
        (".php", "php"),
        (".rb", "ruby"),
        (".java", "java"),
        (".c", "c"),
        (".cpp", "cpp"),
        (".cs", "csharp"),
        (".go", "go"),
        (".rs", "rust"),
        (".vue", "vue"),
        (".svelte", "svelte"),
        (".sql", "sql"),
        (".graphql", "graphql"),
        (".gql", "graphql"),
        // Mobile
        (".dart", "dart"),
        (".gradle", "groovy"),
        (".plist", "xml"),
        (".xcconfig", "properties"),
        (".properties", "properties"),
        (".arb", "json"),
        (".bat", "batch"),
    ]
    .into_iter()
    .collect()
});

/// Language tag for a fenced code block; empty when unknown.
pub fn language_for_extension(extension: &str) -> &'static str {
    EXTENSION_LANGUAGES
        .get(extension.to_lowercase().as_str())
        .copied()
        .unwrap_or("")
}
