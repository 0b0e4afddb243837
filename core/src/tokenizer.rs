use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use unicode_normalization::UnicodeNormalization;

/// Joins the two words of a biword key. Never produced by `normalize`.
pub const BIWORD_SEPARATOR: char = '\u{1f}';

lazy_static! {
    static ref STRIP: Regex = Regex::new(r"[^\w\s-]").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// NFKC, lowercase, and strip everything but word chars, whitespace and hyphens.
pub fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    STRIP.replace_all(&lowered, "").into_owned()
}

pub fn biword_key(first: &str, second: &str) -> String {
    let mut key = String::with_capacity(first.len() + second.len() + 1);
    key.push_str(first);
    key.push(BIWORD_SEPARATOR);
    key.push_str(second);
    key
}

/// Bounded word -> stem cache with least-recently-used eviction.
pub struct StemCache {
    entries: Mutex<LruCache<String, String>>,
}

impl StemCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    fn get_or_insert_with(&self, word: &str, stem: impl FnOnce() -> String) -> String {
        if let Some(hit) = self.entries.lock().get(word) {
            return hit.clone();
        }
        let value = stem();
        self.entries.lock().put(word.to_string(), value.clone());
        value
    }

    /// Stems a whole word sequence with at most two lock acquisitions:
    /// one to read hits, one to store the misses stemmed in between.
    fn stem_all<'w>(&self, words: &[&'w str], stem: impl Fn(&str) -> String) -> Vec<String> {
        let mut stems: Vec<Option<String>> = {
            let mut entries = self.entries.lock();
            words.iter().map(|w| entries.get(*w).cloned()).collect()
        };
        let mut misses: HashMap<&'w str, String> = HashMap::new();
        for (&word, slot) in words.iter().zip(stems.iter_mut()) {
            if slot.is_none() {
                *slot = Some(misses.entry(word).or_insert_with(|| stem(word)).clone());
            }
        }
        if !misses.is_empty() {
            let mut entries = self.entries.lock();
            for (word, value) in misses {
                entries.put(word.to_string(), value);
            }
        }
        stems.into_iter().flatten().collect()
    }
}

/// Text analysis shared by indexing and querying.
pub struct Tokenizer {
    stemmer: Stemmer,
    cache: StemCache,
}

impl Tokenizer {
    pub fn new(cache: StemCache) -> Self {
        Self { stemmer: Stemmer::create(Algorithm::English), cache }
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self::new(StemCache::new(capacity))
    }

    pub fn cache(&self) -> &StemCache {
        &self.cache
    }

    pub fn stem(&self, word: &str) -> String {
        self.cache
            .get_or_insert_with(word, || self.stemmer.stem(word).into_owned())
    }

    /// Normalized, stop-word filtered, stemmed terms in document order.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text);
        let kept: Vec<&str> = normalized.split_whitespace().filter(|w| !is_stopword(w)).collect();
        match kept.as_slice() {
            [] => Vec::new(),
            [single] => vec![self.stem(single)],
            _ => self.cache.stem_all(&kept, |w| self.stemmer.stem(w).into_owned()),
        }
    }

    /// Normalized words with stop words kept and no stemming; the phrase stream.
    pub fn words(&self, text: &str) -> Vec<String> {
        normalize(text).split_whitespace().map(str::to_string).collect()
    }

    pub fn biwords(&self, text: &str) -> Vec<String> {
        self.words(text)
            .windows(2)
            .map(|pair| biword_key(&pair[0], &pair[1]))
            .collect()
    }

    /// The indexed form of a single query word, if it survives filtering.
    pub fn query_term(&self, word: &str) -> Option<String> {
        self.tokenize(word).into_iter().next()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::with_cache_capacity(crate::config::DEFAULT_STEM_CACHE_CAPACITY)
    }
}
