use tantivy::tokenizer::{
    Language as StemLanguage, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer,
    TokenStream,
};

/// Bumped whenever tokenization output changes, so stale indexes are noticed.
pub const TOKENIZER_VERSION: u32 = 2;

const MAX_TOKEN_LEN: usize = 40;

/// English stop words plus question framing ("tell me", "explain") that carries no topic.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost", "alone", "along",
    "already", "also", "although", "always", "am", "among", "amongst", "amoungst", "amount", "an", "and", "another",
    "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
    "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "define", "describe", "detail", "did", "do", "does", "done", "down", "due",
    "during", "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even", "ever",
    "every", "everyone", "everything", "everywhere", "except", "explain", "few", "fifteen", "fifty", "fill", "find",
    "fire", "first", "five", "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "having", "he", "hence", "her", "here", "hereafter", "hereby",
    "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if",
    "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself", "keep", "know", "last", "latter",
    "latterly", "least", "less", "let", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine",
    "more", "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
    "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of",
    "off", "often", "ok", "okay", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our",
    "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see",
    "seem", "seemed", "seeming", "seems", "serious", "several", "shall", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "tell", "ten", "than", "thank", "thanks", "that", "the", "their", "them",
    "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these",
    "they", "thick", "thin", "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus", "to",
    "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
    "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
    "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours", "yourself", "yourselves",
];

/// Text analyzer shared by index build and query vectorization.
///
/// Splits on non-alphanumeric characters, lowercases, drops stop words and
/// overly long tokens, and optionally applies English stemming.
#[derive(Clone)]
pub struct Analyzer {
    inner: TextAnalyzer,
    stemming: bool,
}

impl Analyzer {
    pub fn new(stemming: bool) -> Self {
        let base = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())));
        let inner = if stemming {
            base.filter(Stemmer::new(StemLanguage::English)).build()
        } else {
            base.build()
        };
        Self { inner, stemming }
    }

    /// Identifier recorded in index info, e.g. `simple+lower+stop:v2`.
    pub fn name(&self) -> String {
        let stem = if self.stemming { "+stem" } else { "" };
        format!("simple+lower+stop{stem}:v{TOKENIZER_VERSION}")
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        // token_stream needs &mut, the analyzer itself is shared
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    /// Unigrams, followed by space-joined n-grams up to `ngram_max` over the
    /// filtered token sequence.
    pub fn terms(&self, text: &str, ngram_max: usize) -> Vec<String> {
        let tokens = self.tokens(text);
        let mut terms = tokens.clone();
        for n in 2..=ngram_max {
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").field("name", &self.name()).finish()
    }
}
