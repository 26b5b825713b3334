//! Skill extraction by vocabulary containment.
//!
//! A term matches when its lowercase form occurs anywhere in the lowercased
//! document text. There is no word-boundary check, so short terms such as
//! `"R"` or `"Go"` match inside longer words.

/// Built-in skills vocabulary.
pub const SKILLS_VOCABULARY: &[&str] = &[
    // Languages
    "Python", "Java", "JavaScript", "TypeScript", "Go", "Golang", "Rust", "C++", "C#", "Swift",
    "Kotlin", "Ruby", "Bash", "Shell scripting", "Scala", "R",
    // Frontend
    "HTML5", "CSS3", "SCSS", "SASS", "React.js", "Angular", "Vue.js", "Svelte", "Next.js",
    "Tailwind CSS", "Webpack", "Vite", "Responsive Design", "Bootstrap", "Material UI",
    "WebAssembly", "WASM",
    // Backend
    "Node.js", "Express.js", "Spring Boot", "Django", "Flask", "FastAPI", ".NET Core", "NestJS",
    "GraphQL", "Apollo", "Relay", "RESTful APIs", "gRPC",
    // Cloud and infrastructure
    "AWS", "Lambda", "S3", "EC2", "CloudFormation", "Azure", "App Services", "Functions", "AKS",
    "Google Cloud Platform", "GCP", "Docker", "Kubernetes", "Terraform", "Ansible", "Jenkins",
    "GitHub Actions", "GitLab CI", "Helm", "ArgoCD", "Vagrant",
    // Data stores
    "SQL", "PostgreSQL", "MySQL", "SQLite", "NoSQL", "MongoDB", "DynamoDB", "Cassandra", "Redis",
    "Elasticsearch", "Neo4j", "Firebase", "Firestore", "InfluxDB",
    // Data and ML
    "Pandas", "NumPy", "Scikit-learn", "TensorFlow", "PyTorch", "Hugging Face Transformers",
    "OpenCV", "LangChain", "LLaMA", "Mistral", "GPT", "Claude", "Gemini", "MLflow",
    "Prompt Engineering", "FAISS", "Pinecone", "Weaviate", "Qdrant", "Apache Spark", "Dask",
    "Airflow", "dbt", "Kafka", "LLMOps",
    // Collaboration
    "Git", "GitHub", "GitLab", "Bitbucket", "JIRA", "Trello", "ClickUp", "Confluence", "Notion",
    "Agile", "Scrum",
    // Security
    "OAuth 2.0", "OpenID Connect", "JWT", "OWASP Top 10", "Secure Coding Practices", "SIEM tools",
    "IAM", "Identity and Access Management",
    // Testing
    "Jest", "Mocha", "Chai", "Pytest", "unittest", "JUnit", "TestNG", "Cypress", "Playwright",
    "Selenium", "Postman", "Newman", "SonarQube", "TDD", "BDD",
    // Mobile
    "React Native", "Flutter", "Dart", "Xamarin", "Ionic",
    // Web3
    "Solidity", "Ethereum", "EVM", "Hardhat", "Truffle", "IPFS", "Smart Contracts",
    // Practices
    "System Design", "API Design", "Documentation", "Clean Code", "SOLID principles", "Debugging",
    "Profiling", "Technical Writing", "Code Reviews",
];

/// Case-insensitive containment matcher over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct SkillMatcher {
    /// (display form, lowercase form), in vocabulary order.
    terms: Vec<(String, String)>,
}

impl SkillMatcher {
    /// Matcher over the built-in vocabulary followed by `extra` terms.
    ///
    /// Extra terms already present (ignoring case) or blank are skipped.
    pub fn new(extra: &[String]) -> Self {
        let mut terms: Vec<(String, String)> = Vec::with_capacity(SKILLS_VOCABULARY.len());
        let candidates = SKILLS_VOCABULARY
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().map(|s| s.trim().to_string()));

        for term in candidates {
            if term.is_empty() {
                continue;
            }
            let lowered = term.to_lowercase();
            if terms.iter().any(|(_, l)| *l == lowered) {
                continue;
            }
            terms.push((term, lowered));
        }

        Self { terms }
    }

    /// Return every vocabulary term contained in `text`, in vocabulary order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.terms
            .iter()
            .filter(|(_, lowered)| haystack.contains(lowered.as_str()))
            .map(|(term, _)| term.clone())
            .collect()
    }

    /// Number of terms in the vocabulary.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for SkillMatcher {
    fn default() -> Self {
        Self::new(&[])
    }
}
