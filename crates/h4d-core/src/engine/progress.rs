#[derive(Debug, Clone)]
pub enum Progress {
    CampaignStart { total_solutes: u64 },
    CampaignFinish,

    SoluteStart { name: String },
    DocumentEncoded { phase: &'static str, warnings: usize },
    JobSubmitted { scheduler: &'static str },
    SoluteFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
