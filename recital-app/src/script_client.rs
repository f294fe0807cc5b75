//! Script acquisition: HTTP client for the generation API, plus a canned
//! offline provider so practice works without any backend.

use std::time::Duration;

use recital_core::{RecitalError, ScriptPlan, ScriptProvider, ScriptRequest, VocabularyHint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// `(duration id, expected seconds)` pairs the collaborators understand.
const DURATION_MAP: [(&str, u32); 3] = [("2-minute", 120), ("5-minute", 300), ("10-minute", 600)];

fn expected_seconds_for(duration_id: &str) -> u32 {
    DURATION_MAP
        .iter()
        .find(|(id, _)| *id == duration_id)
        .map(|(_, secs)| *secs)
        .unwrap_or(DURATION_MAP[0].1)
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    topic: &'a str,
    duration: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    speech_text: String,
    expected_time: u32,
    #[serde(default)]
    vocabulary: Vec<VocabularyHint>,
}

/// Fetches scripts from `{base}/api/speech/generate`.
pub struct HttpScriptProvider {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpScriptProvider {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ScriptProvider for HttpScriptProvider {
    fn fetch(&self, request: &ScriptRequest) -> recital_core::error::Result<ScriptPlan> {
        let url = format!("{}/api/speech/generate", self.base_url);
        debug!(%url, topic = %request.topic, "requesting script");

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                topic: &request.topic,
                duration: &request.duration_id,
            })
            .send()
            .map_err(|e| RecitalError::ScriptFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| RecitalError::ScriptFetch(e.to_string()))?;

        let body: GenerateResponse = response
            .json()
            .map_err(|e| RecitalError::ScriptFetch(e.to_string()))?;

        info!(
            topic = %request.topic,
            expected_seconds = body.expected_time,
            vocabulary = body.vocabulary.len(),
            "script received"
        );
        Ok(ScriptPlan {
            text: body.speech_text,
            expected_seconds: body.expected_time,
            vocabulary: body.vocabulary,
        })
    }
}

// ---------------------------------------------------------------------------
// Canned offline provider
// ---------------------------------------------------------------------------

const CANNED_2_MINUTE: &str = "Technology has transformed the way we live, work, and communicate \
with each other. In today's digital age, smartphones, computers, and the internet have become \
essential parts of our daily lives. We use technology for everything from staying connected with \
friends and family to managing our finances and accessing information. The rapid advancement of \
technology has brought numerous benefits to society. It has made communication faster and more \
efficient, allowing us to connect with people across the globe in seconds. Education has become \
more accessible through online learning platforms, and healthcare has improved with the \
development of advanced medical equipment and telemedicine. However, technology also presents \
challenges. Privacy concerns, cybersecurity threats, and the digital divide are issues we must \
address. As we continue to embrace new technologies, it is crucial that we use them responsibly \
and ensure that their benefits are shared by everyone in society.";

const CANNED_5_MINUTE: &str = "Technology has fundamentally changed every aspect of human \
existence in the modern world. From the moment we wake up to the time we go to sleep, we \
interact with devices and systems that make our lives more convenient, efficient, and connected \
than ever before. The evolution of technology over the past few decades has been remarkable. We \
have witnessed the rise of personal computers, the birth of the internet, the smartphone \
revolution, and now the era of artificial intelligence. One of the most significant impacts has \
been on communication. In the past, staying in touch with someone in another country meant \
writing letters that took weeks to arrive. Today, we can video chat with anyone in the world for \
free and collaborate with colleagues across continents in real time. Education has also been \
transformed. Students can access vast libraries of information online, take courses from \
prestigious universities, and use interactive learning tools that make studying more engaging. \
This democratization of education has opened opportunities for people who might never have had \
access to quality learning before. In healthcare, technology has enabled doctors to diagnose \
diseases more accurately and develop new treatments at a faster pace, while telemedicine has \
made care accessible to people in remote areas. However, we must also acknowledge the \
challenges that come with our increasing reliance on technology. Privacy has become a major \
concern as companies collect vast amounts of personal data. Cybersecurity threats are constantly \
evolving, and the digital divide creates inequalities in education and economic opportunity. As \
we move forward, it is essential that we approach technology with both optimism and caution, \
working together to ensure that its benefits reach all of humanity while minimizing the harm to \
society and the environment.";

const CANNED_10_MINUTE: &str = "Technology has become the defining force of our age, reshaping \
virtually every aspect of human existence in ways both profound and subtle. From the moment we \
wake to the sound of a smartphone alarm to the time we fall asleep watching streaming content, \
technology mediates our experience of the world. Understanding this transformation, its \
benefits, its risks, and its implications for the future is essential for anyone seeking to \
thrive in the twenty-first century. The pace of change has accelerated dramatically. Computing \
power has doubled roughly every two years, enabling devices to become smaller, faster, and \
cheaper. The internet has grown from a network connecting a few thousand computers to a global \
system linking billions of devices and users. These changes have occurred so quickly that \
society is still adapting to their implications. Communication has been transformed perhaps \
more than any other part of life. Throughout most of history, communication over distance was \
slow and expensive. Today we can instantly video chat with anyone in the world, share our \
thoughts with millions, and collaborate in real time across continents. This revolution has \
connected humanity as never before, though it has also created new challenges around \
misinformation, privacy, and digital overload. The economy has been restructured as well. \
Online commerce has disrupted traditional retail, the gig economy has created new kinds of \
flexible work, and entire industries have been built around digital products that did not exist \
a generation ago. Meanwhile, automation threatens to displace workers in fields from \
manufacturing to transportation, and navigating this transformation requires adaptability and \
continuous learning. Education has been democratized in unprecedented ways. Online platforms \
offer courses from the best universities to anyone with a connection, software adapts to each \
student's pace, and digital textbooks are updated in real time. Healthcare has been \
revolutionized by medical imaging, electronic records, telemedicine, and artificial \
intelligence that helps diagnose disease with remarkable accuracy. Yet these advances raise \
questions about data privacy, the cost of medical technology, and the human elements of care. \
Artificial intelligence represents perhaps the most transformative technology on the horizon. \
Machine learning systems can now perform tasks that once required human intelligence, from \
recognizing faces to translating languages to driving cars. As these capabilities advance, they \
promise to reshape industries while raising profound questions about the future of work, the \
nature of creativity, and what it means to be human in an age of intelligent machines. Privacy \
has become one of the central challenges of the digital era. Every click, search, and purchase \
generates data that companies collect and monetize. Finding the right balance between the \
benefits of data-driven services and the protection of personal information is a challenge that \
individuals, companies, and regulators are all grappling with. Cybersecurity threats have grown \
in sophistication and severity, and protecting against them requires constant vigilance and \
education. The environmental impact of technology is increasingly concerning as well, from the \
electricity consumed by data centers to the accumulation of electronic waste. Addressing these \
challenges requires sustainable approaches to how technology is built, used, and retired.";

/// Small built-in glossary used to surface vocabulary hints from a script.
const GLOSSARY: [(&str, &str, &str); 12] = [
    (
        "unprecedented",
        "Never done or known before",
        "The advancement was unprecedented in history.",
    ),
    (
        "revolutionize",
        "Change something completely and fundamentally",
        "Smartphones revolutionized communication.",
    ),
    (
        "innovation",
        "A new method, idea, or product",
        "The company is known for its innovation.",
    ),
    (
        "artificial",
        "Made by human beings rather than occurring naturally",
        "Artificial intelligence is transforming industries.",
    ),
    (
        "accessible",
        "Able to be reached or easily obtained",
        "Online courses made education more accessible.",
    ),
    (
        "significant",
        "Important or worthy of attention",
        "The discovery had significant implications.",
    ),
    (
        "fundamental",
        "Forming a necessary base or core",
        "Education is fundamental to development.",
    ),
    (
        "comprehensive",
        "Including all or nearly all elements",
        "A comprehensive study was conducted.",
    ),
    (
        "perspective",
        "A particular way of viewing things",
        "Travel broadens your perspective.",
    ),
    (
        "essential",
        "Absolutely necessary; extremely important",
        "Water is essential for life.",
    ),
    (
        "vigilance",
        "Careful watch for danger or difficulty",
        "Security requires constant vigilance.",
    ),
    (
        "sustainable",
        "Able to continue without exhausting resources",
        "We need sustainable approaches to energy.",
    ),
];

/// At most this many vocabulary hints per script.
const MAX_VOCABULARY_HINTS: usize = 8;

/// Collect glossary hits from a script, first occurrence order, deduplicated.
pub fn extract_vocabulary(text: &str) -> Vec<VocabularyHint> {
    let lowered = text.to_lowercase();
    let mut found = Vec::new();
    for word in lowered.split(|c: char| !c.is_ascii_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        if let Some((term, meaning, example)) = GLOSSARY.iter().find(|(term, _, _)| *term == word) {
            if found
                .iter()
                .any(|hint: &VocabularyHint| hint.word.eq_ignore_ascii_case(term))
            {
                continue;
            }
            let mut chars = term.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => continue,
            };
            found.push(VocabularyHint {
                word: capitalized,
                meaning: (*meaning).to_string(),
                example: Some((*example).to_string()),
            });
            if found.len() >= MAX_VOCABULARY_HINTS {
                break;
            }
        }
    }
    found
}

/// Offline provider serving the built-in scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannedScriptProvider;

impl ScriptProvider for CannedScriptProvider {
    fn fetch(&self, request: &ScriptRequest) -> recital_core::error::Result<ScriptPlan> {
        let text = match request.duration_id.as_str() {
            "5-minute" => CANNED_5_MINUTE,
            "10-minute" => CANNED_10_MINUTE,
            _ => CANNED_2_MINUTE,
        };
        info!(
            topic = %request.topic,
            duration = %request.duration_id,
            "serving canned script"
        );
        Ok(ScriptPlan {
            text: text.to_string(),
            expected_seconds: expected_seconds_for(&request.duration_id),
            vocabulary: extract_vocabulary(text),
        })
    }
}
