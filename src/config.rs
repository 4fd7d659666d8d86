use crate::error::{Error, Result};

pub const DEFAULT_MAX_ADDRESS_SPACE: usize = 64;
pub const DEFAULT_TLB_CAPACITY: usize = 2;
pub const DEFAULT_PHYSICAL_PAGE_COUNT: usize = 3;
pub const DEFAULT_PAGE_SIZE: usize = 16;

/// Upper bound on page table entries; every table is allocated up front.
pub const MAX_TABLE_ENTRIES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub max_address_space: usize,
    pub tlb_capacity: usize,
    pub physical_page_count: usize,
    pub page_size: usize,
}

impl Config {
    pub fn new(max_address_space: usize, tlb_capacity: usize, physical_page_count: usize) -> Self {
        Self {
            max_address_space,
            tlb_capacity,
            physical_page_count,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_address_space", self.max_address_space),
            ("tlb_capacity", self.tlb_capacity),
            ("physical_page_count", self.physical_page_count),
            ("page_size", self.page_size),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig(format!("{} must be at least 1", name)));
        }
        if !self.page_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "page_size must be a power of two, got {}",
                self.page_size
            )));
        }
        if self.max_address_space > i64::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_address_space must not exceed {}",
                i64::MAX
            )));
        }
        let pages = self.page_table_size();
        if pages > MAX_TABLE_ENTRIES {
            return Err(Error::InvalidConfig(format!(
                "{} virtual pages exceed the limit of {}",
                pages, MAX_TABLE_ENTRIES
            )));
        }
        if self.tlb_capacity > pages {
            return Err(Error::InvalidConfig(format!(
                "tlb_capacity {} exceeds the {} virtual pages",
                self.tlb_capacity, pages
            )));
        }
        if self.physical_page_count > pages {
            return Err(Error::InvalidConfig(format!(
                "physical_page_count {} exceeds the {} virtual pages",
                self.physical_page_count, pages
            )));
        }
        if self
            .physical_page_count
            .checked_mul(self.page_size)
            .is_none()
        {
            return Err(Error::InvalidConfig(
                "physical memory size overflows".to_string(),
            ));
        }
        Ok(())
    }

    pub fn page_table_size(&self) -> usize {
        self.max_address_space.div_ceil(self.page_size)
    }

    pub fn offset_bits(&self) -> u32 {
        self.page_size.trailing_zeros()
    }

    pub fn vpn_bits(&self) -> u32 {
        let pages = self.page_table_size();
        if pages <= 1 {
            1
        } else {
            usize::BITS - (pages - 1).leading_zeros()
        }
    }

    pub fn offset_mask(&self) -> usize {
        self.page_size - 1
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ADDRESS_SPACE,
            DEFAULT_TLB_CAPACITY,
            DEFAULT_PHYSICAL_PAGE_COUNT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{PhysicalAddress, Ppn};

    #[test]
    fn reference_sizing() {
        let config = Config::default();
        assert_eq!(config.page_size, 16);
        assert_eq!(config.page_table_size(), 4);
        assert_eq!(config.offset_bits(), 4);
        assert_eq!(config.vpn_bits(), 2);
        assert_eq!(config.offset_mask(), 0xF);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn page_table_size_rounds_up() {
        let config = Config::new(50, 2, 3);
        assert_eq!(config.page_table_size(), 4);
        assert_eq!(config.vpn_bits(), 2);

        let config = Config::new(8, 1, 1);
        assert_eq!(config.page_table_size(), 1);
        assert_eq!(config.vpn_bits(), 1);
    }

    #[test]
    fn zero_capacities_are_rejected() {
        assert!(matches!(
            Config::new(64, 0, 3).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new(64, 2, 0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new(0, 2, 3).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn address_space_must_fit_an_i64() {
        let config = Config::new(usize::MAX, 2, 3).with_page_size(1 << 62);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config::new(i64::MAX as usize, 2, 2).with_page_size(1 << 62);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn page_table_is_bounded() {
        let config = Config::new(MAX_TABLE_ENTRIES * 16, 2, 3);
        assert!(config.validate().is_ok());

        let config = Config::new(MAX_TABLE_ENTRIES * 16 + 1, 2, 3);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn capacities_are_bounded_by_virtual_pages() {
        assert!(Config::new(64, 4, 4).validate().is_ok());
        assert!(matches!(
            Config::new(64, usize::MAX, 3).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new(64, 5, 3).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new(64, 2, 5).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn largest_physical_address_fits() {
        let config = Config::new(i64::MAX as usize, 1, 2).with_page_size(1 << 62);
        assert_eq!(config.page_table_size(), 2);
        assert!(config.validate().is_ok());

        let highest = PhysicalAddress {
            ppn: Ppn(config.physical_page_count - 1),
            offset: config.offset_mask(),
            page_size: config.page_size,
        };
        assert_eq!(highest.value(), i64::MAX as usize);

        let config = Config::new(i64::MAX as usize, 1, 4).with_page_size(1 << 62);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn page_size_must_be_power_of_two() {
        let config = Config::default().with_page_size(12);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(Config::default().with_page_size(8).validate().is_ok());
    }
}
