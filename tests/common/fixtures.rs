use std::path::Path;
use std::time::Duration;

use skillfuse::{Config, SkillDocument, TierPolicy};

pub const START_MS: i64 = 1_700_000_000_000;
pub const TEST_DIM: usize = 64;

/// The two-document docker corpus.
pub fn docker_docs() -> Vec<SkillDocument> {
    vec![
        SkillDocument::new("a", "docker helper"),
        SkillDocument::new("b", "docker compose tool"),
    ]
}

/// A mixed corpus with filterable metadata.
pub fn mixed_corpus() -> Vec<SkillDocument> {
    vec![
        SkillDocument::new("git-rebase", "git rebase assistant")
            .with_description("Interactive rebase and history cleanup")
            .with_tags(["git", "vcs"])
            .with_source("github")
            .with_category("vcs")
            .with_quality(0.9),
        SkillDocument::new("git-bisect", "git bisect runner")
            .with_description("Find the commit that broke the build")
            .with_tags(["git", "debugging"])
            .with_source("local")
            .with_category("vcs")
            .with_quality(0.3),
        SkillDocument::new("k8s-deploy", "kubernetes deploy")
            .with_description("Roll out manifests to a cluster")
            .with_tags(["kubernetes", "devops"])
            .with_source("github")
            .with_category("devops")
            .with_quality(0.7),
        SkillDocument::new("docker-build", "docker image builder")
            .with_description("Multi-stage builds and layer caching")
            .with_tags(["docker", "devops"])
            .with_source("github")
            .with_category("devops")
            .with_quality(0.6),
    ]
}

pub fn short_policy() -> TierPolicy {
    TierPolicy {
        standard_ttl: Duration::from_secs(60),
        popular_ttl: Duration::from_secs(600),
        rare_ttl: Duration::from_secs(5),
        popular_hit_threshold: 3,
        stall_window: Duration::from_secs(30),
        refresh_fraction: 0.1,
    }
}

/// Defaults rooted at `dir`, with a small embedding dimension.
pub fn config_in(dir: &Path) -> Config {
    Config {
        storage_path: dir.to_path_buf(),
        embedding_dim: TEST_DIM,
        ..Config::default()
    }
}
