use super::*;

/// The valid-jobs map. A *new block* (previous hash changed, height not
/// behind) clears the map atomically; refreshes accumulate alongside the
/// jobs they supersede so in-flight submits against older job ids still
/// validate.
pub struct Jobs {
    context: JobContext,
    current: Option<Arc<Job>>,
    valid: HashMap<JobId, Arc<Job>>,
    last_id: JobId,
}

impl Jobs {
    pub fn new(context: JobContext) -> Self {
        Self {
            context,
            current: None,
            valid: HashMap::new(),
            last_id: JobId::new(0),
        }
    }

    fn next_id(&mut self) -> JobId {
        self.last_id = self.last_id.next();
        self.last_id
    }

    pub fn current(&self) -> Option<Arc<Job>> {
        self.current.clone()
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.valid.get(id).cloned()
    }

    /// Looks a job up by the job id string a miner submitted.
    pub fn get_by_wire_id(&self, id: &str) -> Option<Arc<Job>> {
        self.get(&id.parse().ok()?)
    }

    /// Decides whether the template is a *new block*: no current job, or a
    /// changed previous hash at a height that is not behind the current one.
    /// On a new block the valid-jobs map is replaced wholesale. Returns the
    /// new job, or `None` for same-work refreshes and outdated templates.
    pub fn process_template(&mut self, template: Arc<BlockTemplate>) -> Result<Option<Arc<Job>>> {
        if let Some(current) = &self.current {
            if template.previous_block_hash == current.template.previous_block_hash {
                return Ok(None);
            }

            if template.height < current.template.height {
                warn!(
                    "Ignoring outdated block template at height {} (current {})",
                    template.height, current.template.height
                );
                return Ok(None);
            }
        }

        let job = Arc::new(Job::new(template, self.next_id(), &self.context)?);

        info!(
            "New block template at height {} (job {})",
            job.template.height, job.job_id
        );

        self.valid.clear();
        self.valid.insert(job.job_id, job.clone());
        self.current = Some(job.clone());

        Ok(Some(job))
    }

    /// Rebuilds the current work under a fresh job id without invalidating
    /// existing jobs; broadcast with `clean_jobs = false`.
    pub fn update_current_job(&mut self, template: Arc<BlockTemplate>) -> Result<Arc<Job>> {
        let job = Arc::new(Job::new(template, self.next_id(), &self.context)?);

        debug!(
            "Refreshed job {} at height {}",
            job.job_id, job.template.height
        );

        self.valid.insert(job.job_id, job.clone());
        self.current = Some(job.clone());

        Ok(job)
    }
}
