pub struct DefaultsConfig {
    pub cutoff: f64,
    pub alignment: bool,
    pub bipartite: bool,
    pub pretty: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cutoff: 10.0,
            alignment: false,
            bipartite: false,
            pretty: true,
        }
    }
}
