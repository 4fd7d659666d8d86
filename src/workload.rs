use rand::Rng;

use crate::config::Config;

const WORKING_SET_HIT_RATE: f64 = 0.75;

pub fn random_address<R: Rng>(config: &Config, rng: &mut R) -> usize {
    rng.random_range(0..config.max_address_space)
}

pub struct Workload<R: Rng> {
    config: Config,
    rng: R,
    pub working_set: WorkingSet,
    pub state: WorkloadState,
}

impl<R: Rng> Workload<R> {
    pub fn new(
        config: Config,
        rng: R,
        working_set_size: usize,
        length: usize,
        working_set_lifespan: usize,
    ) -> Self {
        let mut workload = Self {
            config,
            rng,
            working_set: WorkingSet::new(working_set_size.max(1)),
            state: WorkloadState::new(length, working_set_lifespan.max(1)),
        };
        workload.scramble();
        workload
    }

    fn scramble(&mut self) {
        self.working_set
            .scramble(self.config.page_table_size(), &mut self.rng);
    }
}

impl<R: Rng> Iterator for Workload<R> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.state.age >= self.state.length {
            return None;
        }

        if self.state.working_set_age >= self.state.working_set_lifespan {
            self.scramble();
            self.state.working_set_age = 0;
        }

        self.state.age += 1;
        self.state.working_set_age += 1;

        let address = if self.rng.random_bool(WORKING_SET_HIT_RATE) {
            let idx = self.rng.random_range(0..self.working_set.size);
            let vpn = self.working_set.vpns[idx];
            let offset = self.rng.random_range(0..self.config.page_size);
            (vpn * self.config.page_size + offset).min(self.config.max_address_space - 1)
        } else {
            random_address(&self.config, &mut self.rng)
        };
        Some(address)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.length.saturating_sub(self.state.age);
        (remaining, Some(remaining))
    }
}

pub struct WorkloadState {
    pub age: usize,
    pub length: usize,

    pub working_set_age: usize,
    pub working_set_lifespan: usize,
}

impl WorkloadState {
    pub fn new(length: usize, working_set_lifespan: usize) -> Self {
        Self {
            age: 0,
            length,

            working_set_age: 0,
            working_set_lifespan,
        }
    }
}

pub struct WorkingSet {
    pub size: usize,
    pub vpns: Vec<usize>,
}

impl WorkingSet {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            vpns: Vec::with_capacity(size),
        }
    }

    pub fn scramble<R: Rng>(&mut self, page_count: usize, rng: &mut R) {
        self.vpns.clear();
        for _ in 0..self.size {
            let vpn = rng.random_range(0..page_count);
            self.vpns.push(vpn);
        }
    }
}
