//! Cross-crate scenario tests: two versions of a small obfuscated client run through the
//! analyses and the full remap pipeline.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod artifacts {
    mod loading;
    mod mapping;
}

#[cfg(test)]
mod analysis {
    mod multiplier;
    mod normalize;
    mod opaque;
    mod reachability;
}

#[cfg(test)]
mod matcher {
    mod carry;
    mod fields;
    mod pipeline;
    mod refine;
}
