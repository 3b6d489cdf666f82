pub trait BitflagsExt {
    fn contains(self, other: Self) -> bool;
}

macro_rules! num {
    ($ty:ident) => {
        impl BitflagsExt for $ty {
            fn contains(self, other: Self) -> bool {
                self & other == other
            }
        }
    };
}

num!(u32);
num!(u64);
