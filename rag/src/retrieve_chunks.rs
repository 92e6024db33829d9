use crate::config::Config;
use crate::error::Result;
use crate::vector_index::VectorIndex;

/// One retrieved chunk, ranked from 1 in descending similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub rank: usize,
    pub score: f32,
    pub text: String,
    pub source: Option<String>,
    pub page: Option<usize>,
}

/// Query the `k` nearest entries in `namespace`.
///
/// An empty or never-written namespace yields no hits.
pub fn retrieve_top(cfg: &Config, index: &dyn VectorIndex, namespace: &str, vector: &[f32]) -> Result<Vec<Hit>> {
    if vector.is_empty() {
        return Ok(vec![]);
    }
    let matches = index.query(&cfg.index().index_name, namespace, vector, cfg.top_k())?;
    Ok(matches
        .into_iter()
        .take(cfg.top_k())
        .enumerate()
        .map(|(i, m)| {
            let (text, source, page) = match m.metadata {
                Some(meta) => (meta.text, Some(meta.source), meta.page),
                None => (String::new(), None, None),
            };
            Hit { rank: i + 1, score: m.score, text, source, page }
        })
        .collect())
}
